use thiserror::Error;

const INITIAL_LINES: usize = 1024;

/// A gap buffer over opaque line handles.
///
/// The live sequence is `line[..gap]` followed by `line[gap + gapsize..]`;
/// the slots in between hold stale values. Every edit first moves the gap
/// to the edit position, so the runs of nearby insertions and deletions an
/// edit script produces cost O(1) amortized per line.
#[derive(Debug, Clone, Default)]
pub struct GapBuffer<T> {
    line: Vec<T>,
    gap: usize,
    gapsize: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("edit script tried to insert beyond eof")]
    InsertBeyondEof,

    #[error("edit script tried to delete beyond eof")]
    DeleteBeyondEof,
}

impl<T: Copy + Default> GapBuffer<T> {
    pub fn new() -> Self {
        Self {
            line: Vec::new(),
            gap: 0,
            gapsize: 0,
        }
    }

    /// Number of live lines.
    pub fn len(&self) -> usize {
        self.line.len() - self.gapsize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `l` before line `n`. `n` is 0-origin and may equal the
    /// current length to append.
    pub fn insert(&mut self, n: usize, l: T) -> Result<(), Error> {
        if n > self.len() {
            return Err(Error::InsertBeyondEof);
        }
        if self.gapsize == 0 {
            self.grow();
        }
        if n < self.gap {
            self.line.copy_within(n..self.gap, n + self.gapsize);
        } else if self.gap < n {
            self.line
                .copy_within(self.gap + self.gapsize..n + self.gapsize, self.gap);
        }
        self.line[n] = l;
        self.gap = n + 1;
        self.gapsize -= 1;
        Ok(())
    }

    /// Deletes lines `n..n + nlines`. `n` is 0-origin.
    pub fn delete(&mut self, n: usize, nlines: usize) -> Result<(), Error> {
        let l = match n.checked_add(nlines) {
            Some(l) if l <= self.len() => l,
            _ => return Err(Error::DeleteBeyondEof),
        };
        if l < self.gap {
            self.line.copy_within(l..self.gap, l + self.gapsize);
        } else if self.gap < n {
            self.line
                .copy_within(self.gap + self.gapsize..n + self.gapsize, self.gap);
        }
        self.gap = n;
        self.gapsize += nlines;
        Ok(())
    }

    /// Iterates the live lines in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.line[..self.gap]
            .iter()
            .chain(self.line[self.gap + self.gapsize..].iter())
    }

    fn grow(&mut self) {
        if self.line.is_empty() {
            self.line.resize(INITIAL_LINES, T::default());
            self.gap = 0;
            self.gapsize = INITIAL_LINES;
        } else {
            // The realloc doubles capacity and the fresh upper half becomes
            // the gap.
            let linemax = self.line.len();
            self.gap = linemax;
            self.gapsize = linemax;
            self.line.resize(linemax * 2, T::default());
        }
    }
}
