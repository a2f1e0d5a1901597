use std::{borrow::Cow, ops::Range};

use thiserror::Error;

use crate::Span;

/// String delimiter in RCS master files.
const SDELIM: u8 = b'@';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("quoted text does not start with @")]
    MissingDelimiter,
}

/// A reader over one `@`-quoted region of a master file.
///
/// Inside a region a doubled `@` stands for a literal `@` and a single `@`
/// terminates the text. Positions are absolute offsets into `data`, so the
/// spans handed out by [`Quoted::get_line`] outlive the reader.
#[derive(Debug)]
pub struct Quoted<'a> {
    data: &'a [u8],
    base: usize,
    pos: usize,
    end: usize,
}

impl<'a> Quoted<'a> {
    /// Opens a reader over `range` within `data`. With `bypass_initial` the
    /// first byte must be the opening `@`, which is skipped.
    pub fn new(data: &'a [u8], range: Range<usize>, bypass_initial: bool) -> Result<Self, Error> {
        let mut pos = range.start;
        if bypass_initial {
            if data.get(pos) != Some(&SDELIM) {
                return Err(Error::MissingDelimiter);
            }
            pos += 1;
        }
        Ok(Self {
            data,
            base: pos,
            pos,
            end: range.end,
        })
    }

    /// Reads one character, collapsing doubled `@`s. Returns `None` at the
    /// end of the region or at a terminating single `@`, without consuming
    /// the terminator.
    pub fn getc(&mut self) -> Option<u8> {
        if self.pos >= self.end {
            return None;
        }
        let c = self.data[self.pos];
        self.pos += 1;
        if c == SDELIM {
            if self.pos < self.end && self.data[self.pos] == SDELIM {
                self.pos += 1;
            } else {
                self.pos -= 1;
                return None;
            }
        }
        Some(c)
    }

    /// Backs up one character and returns the character at the new
    /// position, or `None` at the start of the region.
    pub fn ungetc(&mut self) -> Option<u8> {
        if self.pos <= self.base {
            return None;
        }
        self.pos -= 1;
        let mut c = self.data[self.pos];
        if c == SDELIM {
            // The second half of a doubled delimiter; step over the pair.
            self.pos -= 1;
            c = self.data[self.pos];
        }
        Some(c)
    }

    /// Scans one line and returns its raw span, trailing `\n` included.
    /// A final partial line ends at the terminating `@` instead.
    pub fn get_line(&mut self) -> Option<Span> {
        let start = self.pos;
        let mut c = self.getc()?;
        while c != b'\n' {
            match self.getc() {
                Some(next) => c = next,
                None => break,
            }
        }
        Some(Span {
            start,
            end: self.pos,
        })
    }

    /// Current absolute position.
    pub fn loc(&self) -> usize {
        self.pos
    }

    /// The raw bytes behind a span.
    pub fn slice(&self, span: Span) -> &'a [u8] {
        &self.data[span.start..span.end]
    }
}

/// Collapses doubled `@`s in a raw slice. Borrows when there is nothing to
/// collapse, which is the common case.
pub fn unescaped(raw: &[u8]) -> Cow<'_, [u8]> {
    if !raw.contains(&SDELIM) {
        return Cow::Borrowed(raw);
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        out.push(c);
        i += if c == SDELIM { 2 } else { 1 };
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_initial() {
        let data = b"@abc@";
        assert!(Quoted::new(data, 0..data.len(), true).is_ok());
        assert_eq!(
            Quoted::new(b"abc", 0..3, true).unwrap_err(),
            Error::MissingDelimiter
        );
    }

    #[test]
    fn test_getc_unescapes() {
        let data = b"@a@@b@";
        let mut q = Quoted::new(data, 0..data.len(), true).unwrap();
        assert_eq!(q.getc(), Some(b'a'));
        assert_eq!(q.getc(), Some(b'@'));
        assert_eq!(q.getc(), Some(b'b'));
        // The single closing @ terminates the text, repeatedly.
        assert_eq!(q.getc(), None);
        assert_eq!(q.getc(), None);
    }

    #[test]
    fn test_ungetc() {
        let data = b"@a@@b@";
        let mut q = Quoted::new(data, 0..data.len(), true).unwrap();
        assert_eq!(q.getc(), Some(b'a'));
        assert_eq!(q.getc(), Some(b'@'));
        assert_eq!(q.ungetc(), Some(b'@'));
        assert_eq!(q.getc(), Some(b'@'));
        assert_eq!(q.getc(), Some(b'b'));
        assert_eq!(q.ungetc(), Some(b'b'));
        assert_eq!(q.ungetc(), Some(b'@'));
        assert_eq!(q.ungetc(), Some(b'a'));
        assert_eq!(q.ungetc(), None);
    }

    #[test]
    fn test_get_line() {
        let data = b"@one\ntwo\npartial@";
        let mut q = Quoted::new(data, 0..data.len(), true).unwrap();
        let one = q.get_line().unwrap();
        assert_eq!(q.slice(one), b"one\n");
        let two = q.get_line().unwrap();
        assert_eq!(q.slice(two), b"two\n");
        let partial = q.get_line().unwrap();
        assert_eq!(q.slice(partial), b"partial");
        assert_eq!(q.get_line(), None);
    }

    #[test]
    fn test_unescaped() {
        assert_eq!(unescaped(b"plain").as_ref(), b"plain");
        assert_eq!(unescaped(b"a@@b@@@@c").as_ref(), b"a@b@@c");
    }
}
