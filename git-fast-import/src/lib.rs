//! A writer for the [git-fast-import
//! format](https://git-scm.com/docs/git-fast-import).

use std::io::Write;

mod blob;
pub use blob::Blob;

mod commit;
pub use commit::{Commit, CommitBuilder, FileCommand, Mode, Parent, Property};

mod error;
pub use error::Error;

mod identity;
pub use identity::Identity;

mod mark;
pub use mark::Mark;

/// A writer that writes data in the [git-fast-import command
/// format](https://git-scm.com/docs/git-fast-import).
///
/// Marks are chosen by the caller, which allows mark numbers to exist for
/// objects that are deliberately left out of the stream (an incremental
/// export still has to know the marks of commits it does not re-send).
///
/// The terminal `done` is only written by an explicit [`Writer::done`]
/// call, never on drop, so a stream cut short by an error stays
/// recognizably incomplete to the receiver.
#[derive(Debug)]
pub struct Writer<W>
where
    W: Write,
{
    writer: W,
}

impl<W> Writer<W>
where
    W: Write,
{
    /// Constructs a new git-fast-import writer wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Sends a marked command to fast-import.
    pub fn command<C>(&mut self, mark: Mark, command: &C) -> Result<(), Error>
    where
        C: Command,
    {
        command.write(&mut self.writer, mark)
    }

    /// Sends a `reset` command to fast-import.
    pub fn reset(&mut self, branch_ref: &str, from: Option<Mark>) -> Result<(), Error> {
        writeln!(self.writer, "reset {}", branch_ref)?;
        if let Some(from) = from {
            writeln!(self.writer, "from {}", from)?;
        }
        Ok(writeln!(self.writer)?)
    }

    /// Terminates the stream and flushes the underlying writer.
    pub fn done(mut self) -> Result<(), Error> {
        writeln!(self.writer, "done")?;
        Ok(self.writer.flush()?)
    }
}

/// A mark-taking `git fast-import` command.
pub trait Command {
    /// A function that writes the command in wire format to the given writer.
    fn write(&self, writer: &mut impl Write, mark: Mark) -> Result<(), Error>;
}
