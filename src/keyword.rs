//! Keyword expansion for materialized revision text.
//!
//! Checked-out RCS files carry `$Keyword$` markers that are rewritten with
//! revision metadata. The materializer runs every line through here unless
//! the master's expansion directive asks for a verbatim snapshot.

use rcs_ed::Quoted;

use crate::{error::Error, graph::Version};

const KDELIM: u8 = b'$';
const VDELIM: u8 = b':';

/// Length of the longest keyword name.
const KEYLENGTH: usize = 8;

/// Log bodies with this prefix come from administrative check-ins whose
/// expansion would recurse.
const CIKLOG: &[u8] = b"checked in with -k by ";

/// Per-file expansion mode, from the master's `expand` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expand {
    /// `$Key: value $`, the CVS default.
    Kkv,
    /// KKV plus the locker's name. Locker expansion is unimplemented, so
    /// this behaves as KKV.
    Kkvl,
    /// Keyword only, `$Key$`.
    Kk,
    /// Value only, both delimiters stripped.
    Kv,
    /// Old-value expansion: the text passes through untouched.
    Ko,
    /// Like KO, but binary: no end-of-line normalization anywhere.
    Kb,
}

impl Expand {
    /// Parses a master's directive. Missing and unrecognized directives
    /// both mean KKV, which is what CVS writes for unmarked files.
    pub fn from_directive(directive: Option<&str>) -> Self {
        match directive {
            Some("kvl") => Expand::Kkvl,
            Some("k") => Expand::Kk,
            Some("v") => Expand::Kv,
            Some("o") => Expand::Ko,
            Some("b") => Expand::Kb,
            _ => Expand::Kkv,
        }
    }

    /// Whether lines pass through the expander at all; KO and KB take the
    /// snapshot path instead.
    pub fn expands(self) -> bool {
        !matches!(self, Expand::Ko | Expand::Kb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Author,
    Date,
    Header,
    Id,
    Locker,
    Log,
    Name,
    RcsFile,
    Revision,
    Source,
    State,
}

const MARKERS: [Marker; 11] = [
    Marker::Author,
    Marker::Date,
    Marker::Header,
    Marker::Id,
    Marker::Locker,
    Marker::Log,
    Marker::Name,
    Marker::RcsFile,
    Marker::Revision,
    Marker::Source,
    Marker::State,
];

impl Marker {
    fn name(self) -> &'static str {
        match self {
            Marker::Author => "Author",
            Marker::Date => "Date",
            Marker::Header => "Header",
            Marker::Id => "Id",
            Marker::Locker => "Locker",
            Marker::Log => "Log",
            Marker::Name => "Name",
            Marker::RcsFile => "RCSfile",
            Marker::Revision => "Revision",
            Marker::Source => "Source",
            Marker::State => "State",
        }
    }
}

/// Matches a collected `$Name<delim>` candidate against the keyword table.
fn try_match(candidate: &[u8]) -> Option<Marker> {
    for marker in MARKERS.iter().copied() {
        let name = marker.name().as_bytes();
        if candidate.len() == name.len() + 1
            && &candidate[..name.len()] == name
            && (candidate[name.len()] == KDELIM || candidate[name.len()] == VDELIM)
        {
            return Some(marker);
        }
    }
    None
}

fn latin1_alpha(c: u8) -> bool {
    if c >= 192 && c != 215 && c != 247 {
        return true;
    }
    c.is_ascii_alphabetic()
}

fn latin1_whitespace(c: u8) -> bool {
    c == 32 || (c >= 8 && c <= 13 && c != 10)
}

/// Escapes a path for use inside a keyword value.
fn escape_string(out: &mut Vec<u8>, s: &str) {
    for c in s.bytes() {
        match c {
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b' ' => out.extend_from_slice(b"\\040"),
            KDELIM => out.extend_from_slice(b"\\044"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            _ => out.push(c),
        }
    }
}

fn basefilename(name: &str) -> &str {
    match name.rfind('/') {
        Some(slash) => &name[slash + 1..],
        None => name,
    }
}

/// Expands the keywords of one revision of one master.
pub(crate) struct Expander<'a> {
    mode: Expand,
    enabled: bool,
    filename: &'a str,
    version: &'a Version,
    number: String,
    log: &'a str,
    abspath: Option<String>,
    keyval: Vec<u8>,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(
        mode: Expand,
        enabled: bool,
        filename: &'a str,
        version: &'a Version,
        log: &'a str,
    ) -> Self {
        Self {
            mode,
            enabled,
            filename,
            version,
            number: version.number.to_string(),
            log,
            abspath: None,
            keyval: Vec::with_capacity(KEYLENGTH + 3),
        }
    }

    /// Copies one line into `out`, rewriting any terminated keyword it
    /// meets on the way.
    pub(crate) fn expand_line(
        &mut self,
        q: &mut Quoted<'_>,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let mut pending = q.getc();
        loop {
            let c = match pending {
                Some(c) => c,
                None => return Ok(()),
            };
            match c {
                b'\n' => {
                    out.push(c);
                    return Ok(());
                }
                KDELIM if self.enabled => {
                    self.keyval.clear();
                    self.keyval.push(KDELIM);
                    let mut term = q.getc();
                    while let Some(t) = term {
                        if self.keyval.len() <= KEYLENGTH && latin1_alpha(t) {
                            self.keyval.push(t);
                            term = q.getc();
                        } else {
                            break;
                        }
                    }
                    let t = match term {
                        Some(t) => t,
                        None => {
                            // Input ran out mid-keyword.
                            out.extend_from_slice(&self.keyval);
                            return Ok(());
                        }
                    };
                    self.keyval.push(t);
                    let marker = match try_match(&self.keyval[1..]) {
                        Some(marker) => marker,
                        None => {
                            self.keyval.pop();
                            out.extend_from_slice(&self.keyval);
                            pending = Some(t);
                            continue;
                        }
                    };
                    if t == VDELIM {
                        // Scan for the closing delimiter, keeping the raw
                        // text around in case there is none before the end
                        // of the line.
                        let mut close = q.getc();
                        while let Some(v) = close {
                            if v == b'\n' || v == KDELIM {
                                break;
                            }
                            self.keyval.push(v);
                            close = q.getc();
                        }
                        match close {
                            Some(KDELIM) => {}
                            Some(v) => {
                                out.extend_from_slice(&self.keyval);
                                pending = Some(v);
                                continue;
                            }
                            None => {
                                out.extend_from_slice(&self.keyval);
                                return Ok(());
                            }
                        }
                    }
                    // CVS expands keywords with overlapping delimiters, eg
                    // "$Name$Id$", so the closing delimiter goes back on
                    // the input whenever it stays part of the output. The
                    // Log splice consumes it itself either way.
                    if marker == Marker::Log || self.mode != Expand::Kv {
                        let _ = q.ungetc();
                    }
                    self.keyreplace(marker, q, out)?;
                    pending = q.getc();
                }
                _ => {
                    out.push(c);
                    pending = q.getc();
                }
            }
        }
    }

    fn keyreplace(
        &mut self,
        marker: Marker,
        q: &mut Quoted<'_>,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let exp = self.mode;
        let date = self.date_string();

        if exp != Expand::Kv {
            out.push(KDELIM);
            out.extend_from_slice(marker.name().as_bytes());
        }

        if exp != Expand::Kk {
            if exp != Expand::Kv {
                out.push(VDELIM);
                out.push(b' ');
            }
            match marker {
                Marker::Author => out.extend_from_slice(self.version.author.as_bytes()),
                Marker::Date => out.extend_from_slice(date.as_bytes()),
                Marker::Id | Marker::Header => {
                    if marker == Marker::Id {
                        escape_string(out, basefilename(self.filename));
                    } else {
                        let full = self.full_path()?;
                        escape_string(out, &full);
                    }
                    let meta = format!(
                        " {} {} {} {}",
                        self.number, date, self.version.author, self.version.state
                    );
                    out.extend_from_slice(meta.as_bytes());
                }
                // Locker expansion is not implemented.
                Marker::Locker => {}
                Marker::Log | Marker::RcsFile => {
                    escape_string(out, basefilename(self.filename))
                }
                Marker::Revision => out.extend_from_slice(self.number.as_bytes()),
                Marker::Source => {
                    let full = self.full_path()?;
                    escape_string(out, &full);
                }
                Marker::State => out.extend_from_slice(self.version.state.as_bytes()),
                Marker::Name => {}
            }
            if exp != Expand::Kv {
                out.push(b' ');
            }
        }

        if marker == Marker::Log {
            self.splice_log(q, out, &date)?;
        }
        Ok(())
    }

    /// Splices the revision's log message under the `$Log$` line, repeating
    /// that line's leader in front of every injected line.
    fn splice_log(
        &mut self,
        q: &mut Quoted<'_>,
        out: &mut Vec<u8>,
        date: &str,
    ) -> Result<(), Error> {
        // Unlike the other keywords, Log consumes its closing delimiter.
        if self.mode != Expand::Kv {
            out.push(KDELIM);
        }

        let log = self.log.as_bytes();
        if log.len() >= CIKLOG.len() && &log[..CIKLOG.len()] == CIKLOG {
            // Swallow the pushed-back closing delimiter; it is already in
            // the output.
            let _ = q.getc();
            return Ok(());
        }

        // Back up to the start of the current input line, taking care not
        // to backtrack into another keyword expanded earlier on it.
        let mut num_kdelims = 0;
        loop {
            match q.ungetc() {
                None => break,
                Some(b'\n') => {
                    let _ = q.getc();
                    break;
                }
                Some(KDELIM) => {
                    num_kdelims += 1;
                    if num_kdelims > 2 {
                        let _ = q.getc();
                        break;
                    }
                }
                Some(_) => {}
            }
        }

        // Everything before the `$Log` keyword is the leader repeated in
        // front of the spliced lines.
        let mut leader = Vec::new();
        loop {
            match q.getc() {
                Some(KDELIM) | None => break,
                Some(c) => leader.push(c),
            }
        }

        // A lone C or Pascal comment opener becomes ` *`.
        let cs = leader.len();
        let mut cw = 0;
        while cw < cs && latin1_whitespace(leader[cw]) {
            cw += 1;
        }
        if cw + 1 < cs && leader[cw + 1] == b'*' && (leader[cw] == b'/' || leader[cw] == b'(') {
            let mut i = cw + 1;
            loop {
                i += 1;
                if i == cs {
                    leader[cw] = b' ';
                    break;
                }
                if !latin1_whitespace(leader[i]) {
                    break;
                }
            }
        }

        // Skip the rest of the `$Log ... $` marker itself.
        while let Some(c) = q.getc() {
            if c == KDELIM {
                break;
            }
        }

        out.push(b'\n');
        out.extend_from_slice(&leader);
        let header = format!(
            "Revision {}  {}  {}",
            self.number, date, self.version.author
        );
        out.extend_from_slice(header.as_bytes());

        // The revision state stays out of the header: it may change later
        // without the spliced log being rewritten.
        let mut trimmed = cs;
        while trimmed > 0 && (leader[trimmed - 1] == b' ' || leader[trimmed - 1] == b'\t') {
            trimmed -= 1;
        }

        let mut rest = log;
        loop {
            out.push(b'\n');
            out.extend_from_slice(&leader[..trimmed]);
            if rest.is_empty() {
                break;
            }
            let mut c = rest[0];
            rest = &rest[1..];
            if c != b'\n' {
                out.extend_from_slice(&leader[trimmed..cs]);
                loop {
                    out.push(c);
                    if rest.is_empty() {
                        break;
                    }
                    c = rest[0];
                    rest = &rest[1..];
                    if c == b'\n' {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn date_string(&self) -> String {
        use chrono::{DateTime, Utc};

        match DateTime::<Utc>::from_timestamp(self.version.date.to_unix(), 0) {
            Some(when) => when.format("%Y/%m/%d %H:%M:%S").to_string(),
            None => String::from("1970/01/01 00:00:00"),
        }
    }

    /// Absolute path of the master, for `$Header$` and `$Source$`.
    fn full_path(&mut self) -> Result<String, Error> {
        if self.filename.starts_with('/') {
            return Ok(self.filename.to_string());
        }
        if let Some(path) = &self.abspath {
            return Ok(path.clone());
        }
        let mut name = self.filename;
        while name.starts_with("./") {
            name = name[1..].trim_start_matches('/');
        }
        let dir = std::env::current_dir()?;
        let joined = format!("{}/{}", dir.display(), name);
        self.abspath = Some(joined.clone());
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CvsTime;

    fn version() -> Version {
        Version {
            number: "1.2".parse().unwrap(),
            author: String::from("alice"),
            state: String::from("Exp"),
            // 2020-03-04T05:06:07Z
            date: CvsTime::from_unix(1583298367).unwrap(),
        }
    }

    fn expand(mode: Expand, filename: &str, log: &str, line: &[u8]) -> Vec<u8> {
        let version = version();
        let mut expander = Expander::new(mode, true, filename, &version, log);
        let mut q = Quoted::new(line, 0..line.len(), false).unwrap();
        let mut out = Vec::new();
        expander.expand_line(&mut q, &mut out).unwrap();
        out
    }

    #[test]
    fn test_id_kkv() {
        assert_eq!(
            expand(Expand::Kkv, "src/a.c", "", b"$Id$\n"),
            b"$Id: a.c 1.2 2020/03/04 05:06:07 alice Exp $\n".to_vec()
        );
    }

    #[test]
    fn test_id_replaces_stale_value() {
        assert_eq!(
            expand(Expand::Kkv, "src/a.c", "", b"$Id: old.c 1.1 x y z $\n"),
            b"$Id: a.c 1.2 2020/03/04 05:06:07 alice Exp $\n".to_vec()
        );
    }

    #[test]
    fn test_kk_strips_value() {
        assert_eq!(
            expand(Expand::Kk, "src/a.c", "", b"$Revision: 1.1 $\n"),
            b"$Revision$\n".to_vec()
        );
    }

    #[test]
    fn test_kv_strips_delimiters() {
        assert_eq!(
            expand(Expand::Kv, "src/a.c", "", b"rev $Revision$ here\n"),
            b"rev 1.2 here\n".to_vec()
        );
    }

    #[test]
    fn test_simple_keywords() {
        assert_eq!(
            expand(Expand::Kkv, "a.c", "", b"$Author$ $State$ $RCSfile$\n"),
            b"$Author: alice $ $State: Exp $ $RCSfile: a.c $\n".to_vec()
        );
        assert_eq!(
            expand(Expand::Kkv, "a.c", "", b"$Date$\n"),
            b"$Date: 2020/03/04 05:06:07 $\n".to_vec()
        );
        // Name carries no sticky tag here and expands to an empty value.
        assert_eq!(
            expand(Expand::Kkv, "a.c", "", b"$Name$\n"),
            b"$Name:  $\n".to_vec()
        );
    }

    #[test]
    fn test_overlapping_keywords() {
        // The closing delimiter is pushed back, so it can open the next
        // keyword.
        assert_eq!(
            expand(Expand::Kk, "a.c", "", b"$Name$Id$\n"),
            b"$Name$Id$\n".to_vec()
        );
    }

    #[test]
    fn test_unterminated_keyword_is_verbatim() {
        assert_eq!(
            expand(Expand::Kkv, "a.c", "", b"$Id: no close\n"),
            b"$Id: no close\n".to_vec()
        );
        assert_eq!(
            expand(Expand::Kkv, "a.c", "", b"$NotAKeyword$\n"),
            b"$NotAKeyword$\n".to_vec()
        );
    }

    #[test]
    fn test_disabled_expansion_copies() {
        let version = version();
        let mut expander = Expander::new(Expand::Kkv, false, "a.c", &version, "");
        let line = b"$Id$\n";
        let mut q = Quoted::new(line, 0..line.len(), false).unwrap();
        let mut out = Vec::new();
        expander.expand_line(&mut q, &mut out).unwrap();
        assert_eq!(out, b"$Id$\n".to_vec());
    }

    #[test]
    fn test_escaped_filename() {
        assert_eq!(
            expand(Expand::Kkv, "dir/my file.c", "", b"$RCSfile$\n"),
            b"$RCSfile: my\\040file.c $\n".to_vec()
        );
    }

    #[test]
    fn test_log_splice_with_comment_leader() {
        assert_eq!(
            expand(Expand::Kkv, "a.c", "fix the frobnicator\n", b" * $Log$\n"),
            b" * $Log: a.c $\n \
              * Revision 1.2  2020/03/04 05:06:07  alice\n \
              * fix the frobnicator\n \
              *\n"
                .to_vec()
        );
    }

    #[test]
    fn test_log_splice_converts_c_comment_opener() {
        let out = expand(Expand::Kkv, "a.c", "msg\n", b"/* $Log$\n");
        let text = String::from_utf8(out).unwrap();
        // The `/*` leader is rewritten to ` *` on the injected lines.
        assert!(text.contains("\n * Revision 1.2"), "got: {:?}", text);
        assert!(text.contains("\n * msg\n"), "got: {:?}", text);
    }

    #[test]
    fn test_log_suppresses_administrative_checkins() {
        assert_eq!(
            expand(
                Expand::Kkv,
                "a.c",
                "checked in with -k by somebody\n",
                b"$Log$\n"
            ),
            b"$Log: a.c $\n".to_vec()
        );
    }
}
