use std::convert::TryFrom;

use thiserror::Error;

use crate::{buffer, command, unescaped, GapBuffer, Quoted, Span};

/// High-water marks enforcing the monotonic cursor motion RCS requires of
/// the commands within one delta.
#[derive(Debug, Default)]
struct Watermarks {
    adprev: usize,
    dafter: usize,
}

impl Watermarks {
    fn insert(&mut self, line1: usize) -> Result<(), Error> {
        if line1 < self.adprev {
            return Err(Error::BackwardInsertion);
        }
        self.adprev = line1 + 1;
        Ok(())
    }

    fn delete(&mut self, line1: usize, nlines: usize) -> Result<(), Error> {
        if line1 < self.adprev || line1 < self.dafter {
            return Err(Error::BackwardDeletion);
        }
        self.adprev = line1;
        self.dafter = line1 + nlines;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("backward insertion in delta")]
    BackwardInsertion,

    #[error("backward deletion in delta")]
    BackwardDeletion,

    #[error(transparent)]
    Buffer(#[from] buffer::Error),

    #[error("corrupt delta: {0}")]
    Command(#[from] command::Error),

    #[error("corrupt delta: command addresses a negative line")]
    NegativeLine,

    #[error("corrupt delta: command overflows the line range")]
    LineOverflow,

    #[error("corrupt delta: zero-length command")]
    ZeroLines,

    #[error("unexpected end of patch: wanted {want} line(s) and only got {have}")]
    EndOfFile { have: usize, want: usize },
}

/// Loads a complete revision text: every line of `q` is appended in order.
///
/// This is the entry step for the head node, whose patch region holds the
/// full trunk tip rather than an edit script.
pub fn enter(q: &mut Quoted<'_>, buf: &mut GapBuffer<Span>) -> Result<(), Error> {
    let mut editline = 0;
    while let Some(span) = q.get_line() {
        buf.insert(editline, span)?;
        editline += 1;
    }
    Ok(())
}

/// Applies one delta's edit script to `buf`.
///
/// Insert positions are adjusted by the running insert−delete balance of
/// the current delta, so command addresses always refer to the text as it
/// stood before this delta.
pub fn edit(q: &mut Quoted<'_>, buf: &mut GapBuffer<Span>) -> Result<(), Error> {
    let mut marks = Watermarks::default();
    let mut adjust = 0isize;

    while let Some(line) = q.get_line() {
        let raw = unescaped(q.slice(line));
        match command::Command::parse(strip_newline(&raw))? {
            command::Command::Add { position, lines } => {
                check_counts(position, lines)?;
                marks.insert(position)?;
                let mut editline = adjusted(position as isize, adjust)?;
                for have in 0..lines {
                    let span = q
                        .get_line()
                        .ok_or(Error::EndOfFile { have, want: lines })?;
                    buf.insert(editline, span)?;
                    editline += 1;
                }
                adjust += lines as isize;
            }
            command::Command::Delete { position, lines } => {
                check_counts(position, lines)?;
                marks.delete(position, lines)?;
                let start = adjusted(position as isize - 1, adjust)?;
                buf.delete(start, lines)?;
                adjust -= lines as isize;
            }
        }
    }
    Ok(())
}

fn check_counts(position: usize, lines: usize) -> Result<(), Error> {
    if lines == 0 {
        return Err(Error::ZeroLines);
    }
    if position.checked_add(lines).is_none() {
        return Err(Error::LineOverflow);
    }
    Ok(())
}

fn adjusted(base: isize, adjust: isize) -> Result<usize, Error> {
    usize::try_from(base + adjust).map_err(|_| Error::NegativeLine)
}

fn strip_newline(raw: &[u8]) -> &[u8] {
    match raw.split_last() {
        Some((&b'\n', rest)) => rest,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(data: &[u8]) -> Quoted<'_> {
        Quoted::new(data, 0..data.len(), true).unwrap()
    }

    fn contents(data: &[u8], buf: &GapBuffer<Span>) -> Vec<u8> {
        let mut out = Vec::new();
        for span in buf.iter() {
            out.extend_from_slice(&unescaped(&data[span.start..span.end]));
        }
        out
    }

    #[test]
    fn test_enter_round_trip() {
        let data = b"@alpha\nbeta\ngamma\n@";
        let mut buf = GapBuffer::new();
        enter(&mut quoted(data), &mut buf).unwrap();
        assert_eq!(contents(data, &buf), b"alpha\nbeta\ngamma\n");
    }

    #[test]
    fn test_enter_unescapes_on_output() {
        let data = b"@user@@example.com\n@";
        let mut buf = GapBuffer::new();
        enter(&mut quoted(data), &mut buf).unwrap();
        assert_eq!(contents(data, &buf), b"user@example.com\n");
    }

    #[test]
    fn test_edit_insert_and_delete() {
        // Base text, then a delta deleting line 2 and appending after the
        // last line. The script addresses lines of the pre-delta text;
        // spans from both regions coexist, so both regions share one
        // backing slice.
        let base = b"@one\ntwo\nthree\n@";
        let script = b"@d2 1\na3 2\nfour\nfive\n@";
        let mut data = Vec::new();
        data.extend_from_slice(base);
        let script_start = data.len();
        data.extend_from_slice(script);

        let mut buf = GapBuffer::new();
        enter(
            &mut Quoted::new(&data, 0..script_start, true).unwrap(),
            &mut buf,
        )
        .unwrap();
        edit(
            &mut Quoted::new(&data, script_start..data.len(), true).unwrap(),
            &mut buf,
        )
        .unwrap();
        assert_eq!(contents(&data, &buf), b"one\nthree\nfour\nfive\n");
    }

    #[test]
    fn test_edit_insert_at_start() {
        let base = b"@two\n@";
        let script = b"@a0 1\none\n@";
        let mut data = Vec::new();
        data.extend_from_slice(base);
        let script_start = data.len();
        data.extend_from_slice(script);

        let mut buf = GapBuffer::new();
        enter(
            &mut Quoted::new(&data, 0..script_start, true).unwrap(),
            &mut buf,
        )
        .unwrap();
        edit(
            &mut Quoted::new(&data, script_start..data.len(), true).unwrap(),
            &mut buf,
        )
        .unwrap();
        assert_eq!(contents(&data, &buf), b"one\ntwo\n");
    }

    #[test]
    fn test_backward_insertion_is_fatal() {
        let base = b"@one\ntwo\nthree\n@";
        let script = b"@a2 1\nx\na1 1\ny\n@";
        let mut data = Vec::new();
        data.extend_from_slice(base);
        let script_start = data.len();
        data.extend_from_slice(script);

        let mut buf = GapBuffer::new();
        enter(
            &mut Quoted::new(&data, 0..script_start, true).unwrap(),
            &mut buf,
        )
        .unwrap();
        assert!(matches!(
            edit(
                &mut Quoted::new(&data, script_start..data.len(), true).unwrap(),
                &mut buf,
            ),
            Err(Error::BackwardInsertion)
        ));
    }

    #[test]
    fn test_backward_deletion_is_fatal() {
        let base = b"@one\ntwo\nthree\nfour\n@";
        let script = b"@d3 1\nd1 1\n@";
        let mut data = Vec::new();
        data.extend_from_slice(base);
        let script_start = data.len();
        data.extend_from_slice(script);

        let mut buf = GapBuffer::new();
        enter(
            &mut Quoted::new(&data, 0..script_start, true).unwrap(),
            &mut buf,
        )
        .unwrap();
        assert!(matches!(
            edit(
                &mut Quoted::new(&data, script_start..data.len(), true).unwrap(),
                &mut buf,
            ),
            Err(Error::BackwardDeletion)
        ));
    }

    #[test]
    fn test_zero_count_is_fatal() {
        let data = b"@d1 0\n@";
        let mut buf = GapBuffer::new();
        assert!(matches!(
            edit(&mut quoted(data), &mut buf),
            Err(Error::ZeroLines)
        ));
    }

    #[test]
    fn test_truncated_insert_payload() {
        let data = b"@a0 3\nonly\n@";
        let mut buf = GapBuffer::new();
        assert!(matches!(
            edit(&mut quoted(data), &mut buf),
            Err(Error::EndOfFile { have: 1, want: 3 })
        ));
    }

    #[test]
    fn test_delete_beyond_eof_is_fatal() {
        let base = b"@one\n@";
        let script = b"@d1 5\n@";
        let mut data = Vec::new();
        data.extend_from_slice(base);
        let script_start = data.len();
        data.extend_from_slice(script);

        let mut buf = GapBuffer::new();
        enter(
            &mut Quoted::new(&data, 0..script_start, true).unwrap(),
            &mut buf,
        )
        .unwrap();
        assert!(matches!(
            edit(
                &mut Quoted::new(&data, script_start..data.len(), true).unwrap(),
                &mut buf,
            ),
            Err(Error::Buffer(buffer::Error::DeleteBeyondEof))
        ));
    }
}
