//! On-disk cache of materialized blob bodies.
//!
//! Blobs are produced master by master while commits are emitted
//! repository-wide, so bodies wait in a private temp directory keyed by
//! serial until the first commit referencing them streams them out.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use tempfile::TempDir;

/// Temp-file store of `data <len>\n<bytes>\n` bodies, one file per
/// serial. The directory disappears with the store.
#[derive(Debug)]
pub(crate) struct BlobStore {
    dir: TempDir,
}

impl BlobStore {
    /// Creates the backing directory under `TMPDIR` (default `/tmp`).
    pub(crate) fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("cvs-fast-export-")
            .tempdir()?;
        Ok(Self { dir })
    }

    fn path(&self, serial: usize) -> PathBuf {
        self.dir.path().join(serial.to_string())
    }

    /// Saves one blob body where it will be available for random access.
    pub(crate) fn write(&self, serial: usize, data: &[u8]) -> io::Result<()> {
        let mut blob = BufWriter::new(File::create(self.path(serial))?);
        write!(blob, "data {}\n", data.len())?;
        blob.write_all(data)?;
        blob.write_all(b"\n")?;
        blob.flush()
    }

    /// Opens one stored body for streaming and unlinks it; the open handle
    /// keeps the bytes readable until it drops.
    pub(crate) fn take(&self, serial: usize) -> io::Result<File> {
        let path = self.path(serial);
        let file = File::open(&path)?;
        fs::remove_file(&path)?;
        Ok(file)
    }
}
