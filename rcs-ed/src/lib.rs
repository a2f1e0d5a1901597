//! The line-editing engine behind RCS delta application.
//!
//! An RCS master stores one full revision (the trunk tip) and reaches every
//! other revision through ed-style edit scripts. This crate provides the
//! pieces a materializer needs to replay those scripts: a [`GapBuffer`] of
//! line handles, a [`Quoted`] reader over the `@`-delimited text regions of
//! a master, and the [`enter`]/[`edit`] operations that drive the buffer
//! from a patch region.
//!
//! Lines are never copied while editing. The buffer holds [`Span`]s, raw
//! byte ranges into the master's text, and only resolving a span for output
//! pays for `@@` unescaping.

mod buffer;
pub use buffer::{Error as BufferError, GapBuffer};

mod command;
pub use command::Error as CommandError;

mod quoted;
pub use quoted::{unescaped, Error as QuotedError, Quoted};

mod script;
pub use script::{edit, enter, Error as ScriptError};

/// A raw byte range within a master file's text.
///
/// Spans index the mapped file as a whole, not any single region, so lines
/// from several deltas can mix in one buffer. The bytes are still
/// `@`-escaped; the trailing `\n` is included when the line has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
