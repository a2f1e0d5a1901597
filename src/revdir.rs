//! Pack per-commit file sets into shared directory nodes.
//!
//! Nearly every commit repeats the directory contents of its neighbors, so
//! file lists are sorted into directory-prefix runs and each run is
//! hash-consed: identical runs share one allocation for the lifetime of
//! the store.

use std::{collections::HashMap, ops::Index};

use derive_more::{From, Into};

use crate::graph::{FileId, FileStore};

/// Index of a packed directory in a [`DirStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct DirId(usize);

/// A deduplicated, ordered run of files under one directory prefix.
#[derive(Debug)]
pub struct PackedDir {
    files: Box<[FileId]>,
}

impl PackedDir {
    pub fn files(&self) -> &[FileId] {
        &self.files
    }
}

/// Hash-consing arena for packed directories.
#[derive(Debug, Default)]
pub struct DirStore {
    dirs: Vec<PackedDir>,
    index: HashMap<Box<[FileId]>, DirId>,
}

impl DirStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs one commit's file set.
    ///
    /// The set is sorted by path, split into maximal runs sharing the
    /// directory prefix up to and including the last `/`, and each run is
    /// mapped to its canonical [`PackedDir`]. The sort maximizes run
    /// length, which is where the sharing comes from.
    pub fn pack(&mut self, mut files: Vec<FileId>, store: &FileStore) -> Vec<DirId> {
        files.sort_by(|a, b| store[*a].path.as_str().cmp(store[*b].path.as_str()));

        let mut dirs = Vec::new();
        let mut start = 0;
        let mut prefix = "";
        for i in 0..files.len() {
            let name = store[files[i]].path.as_str();
            if i == 0 || dir_prefix(name) != prefix {
                if i > start {
                    dirs.push(self.pack_dir(&files[start..i]));
                }
                start = i;
                prefix = dir_prefix(name);
            }
        }
        if !files.is_empty() {
            dirs.push(self.pack_dir(&files[start..]));
        }
        dirs
    }

    fn pack_dir(&mut self, run: &[FileId]) -> DirId {
        if let Some(id) = self.index.get(run) {
            return *id;
        }
        let packed: Box<[FileId]> = run.into();
        let id = DirId::from(self.dirs.len());
        self.dirs.push(PackedDir {
            files: packed.clone(),
        });
        self.index.insert(packed, id);
        id
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

impl Index<DirId> for DirStore {
    type Output = PackedDir;

    fn index(&self, id: DirId) -> &PackedDir {
        &self.dirs[usize::from(id)]
    }
}

fn dir_prefix(name: &str) -> &str {
    match name.rfind('/') {
        Some(slash) => &name[..=slash],
        None => "",
    }
}
