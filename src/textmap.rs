//! Memory-mapped master texts behind a small recently-used window.

use std::{fs::File, num::NonZeroUsize, ops::Range, rc::Rc};

use lru::LruCache;
use memmap2::Mmap;

use crate::{error::Error, graph::TextRef, intern::Atom};

/// Upper bound on simultaneously cached mappings.
const TEXT_MAP_SLOTS: usize = 4;

/// An LRU window over mapped master files.
///
/// Within one master every patch region lives in the same file, so the
/// window only turns over between masters. Handles keep their own
/// reference to the mapping; eviction never invalidates text still held by
/// a materializer frame.
pub struct TextMap {
    maps: LruCache<Atom, Rc<Mmap>>,
}

impl TextMap {
    pub fn new() -> Self {
        Self {
            maps: LruCache::new(NonZeroUsize::new(TEXT_MAP_SLOTS).unwrap()),
        }
    }

    /// Maps (or re-uses) the file behind `text` and returns a handle on
    /// its region.
    pub fn load(&mut self, text: &TextRef) -> Result<PatchText, Error> {
        let map = match self.maps.get(&text.path) {
            Some(map) => map.clone(),
            None => {
                let file = File::open(text.path.as_str())?;
                // Safety: masters are read-only inputs; nothing truncates
                // or rewrites them while the exporter runs.
                let map = Rc::new(unsafe { Mmap::map(&file)? });
                log::trace!("mapped {}", text.path);
                self.maps.put(text.path.clone(), map.clone());
                map
            }
        };
        let range = text.range();
        if range.end > map.len() {
            return Err(Error::PatchBounds(text.path.to_string()));
        }
        Ok(PatchText {
            map,
            start: range.start,
            end: range.end,
        })
    }

    /// Drops every cached mapping.
    pub fn unload_all(&mut self) {
        self.maps.clear();
    }
}

impl Default for TextMap {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle on one `@`-delimited region of a mapped master.
#[derive(Clone)]
pub struct PatchText {
    map: Rc<Mmap>,
    start: usize,
    end: usize,
}

impl PatchText {
    /// The whole mapped file; spans index into this slice.
    pub fn data(&self) -> &[u8] {
        &self.map
    }

    /// The patch region within [`PatchText::data`].
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::intern::AtomTable;

    #[test]
    fn test_load_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master,v");
        fs::write(&path, b"junk@text@").unwrap();

        let mut atoms = AtomTable::new();
        let atom = atoms.intern(path.to_str().unwrap());

        let mut maps = TextMap::new();
        let text = maps
            .load(&TextRef {
                path: atom.clone(),
                offset: 4,
                length: 6,
            })
            .unwrap();
        assert_eq!(&text.data()[text.range()], b"@text@");

        assert!(matches!(
            maps.load(&TextRef {
                path: atom,
                offset: 4,
                length: 100,
            }),
            Err(Error::PatchBounds(_))
        ));
    }

    #[test]
    fn test_window_turnover_keeps_handles_alive() {
        let dir = tempfile::tempdir().unwrap();
        let mut atoms = AtomTable::new();
        let mut maps = TextMap::new();

        let mut handles = Vec::new();
        for n in 0..6 {
            let path = dir.path().join(format!("{},v", n));
            fs::write(&path, format!("@{}@", n)).unwrap();
            let atom = atoms.intern(path.to_str().unwrap());
            handles.push(
                maps.load(&TextRef {
                    path: atom,
                    offset: 0,
                    length: 3,
                })
                .unwrap(),
            );
        }

        // The first mappings were evicted from the window, but the handles
        // still read.
        for (n, text) in handles.iter().enumerate() {
            assert_eq!(&text.data()[text.range()], format!("@{}@", n).as_bytes());
        }
    }
}
