//! The conversion core of a CVS-to-Git exporter.
//!
//! Given the in-memory delta graph of each RCS master file and an
//! assembled whole-tree revision list, this crate materializes every file
//! revision, deduplicates per-commit file sets, and emits a
//! `git fast-import` stream in the canonical order git-fast-export
//! produces. Master-file lexing, delta-graph construction, symbol
//! resolution, patchset detection, and author lookup belong to the
//! surrounding tooling; their outputs arrive through the types in
//! [`graph`](crate::graph).
//!
//! A run is two phases over one [`ExportSession`]:
//! [`ExportSession::generate`] once per master saves every emitted
//! revision to a blob cache, then [`ExportSession::export`] links the
//! assembled commits, computes their file operations, and writes the
//! stream.

mod blobs;

mod error;
pub use error::Error;

mod export;
pub use export::{ExportOptions, ExportSession};

mod generate;
pub use generate::{generate, MAX_BRANCH_DEPTH};

pub mod graph;
pub use graph::{
    AuthorEntry, AuthorMap, Commit, CommitId, CvsTime, FileId, FileRev, FileStore, Head, Master,
    Node, NodeId, Patch, RevList, RevNum, Tag, TextRef, Version,
};

mod intern;
pub use intern::{Atom, AtomTable};

mod keyword;
pub use keyword::Expand;

mod revdir;
pub use revdir::{DirId, DirStore, PackedDir};

mod textmap;
pub use textmap::{PatchText, TextMap};

#[cfg(test)]
mod testutil;
