use std::{fs::File, io};

use crate::{Command, Error, Mark};

/// A `blob` command whose `data` body streams from a cache file.
///
/// The file must already hold the complete `data <len>\n<bytes>\n` body;
/// only the `blob`/`mark` header is added here, so large revisions never
/// pass through memory again on their way out.
#[derive(Debug)]
pub struct Blob {
    file: File,
}

impl Blob {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl Command for Blob {
    fn write(&self, writer: &mut impl io::Write, mark: Mark) -> Result<(), Error> {
        write!(writer, "blob\nmark {}\n", mark)?;
        io::copy(&mut &self.file, writer)?;
        Ok(())
    }
}
