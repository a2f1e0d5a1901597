//! The input surface of the export core.
//!
//! Loaders build these structures while parsing masters and assembling
//! patchsets; the materializer and the orchestrator only ever read them.
//! Graphs are arenas indexed by small id newtypes rather than pointer
//! webs, which keeps ownership flat and makes identity comparisons
//! explicit.

use std::{
    collections::HashMap,
    convert::TryFrom,
    fmt::Display,
    num::ParseIntError,
    ops::{Index, Range},
    str::FromStr,
};

use derive_more::{From, Into};
use thiserror::Error;

use crate::{intern::Atom, revdir::DirId, revdir::DirStore};

/// Index of a file record in a [`FileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct FileId(usize);

/// Index of a node within its master's delta graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct NodeId(usize);

/// Index of a commit in a [`RevList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct CommitId(usize);

/// A dotted-decimal RCS revision number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevNum(Vec<u32>);

#[derive(Debug, Error)]
#[error("malformed revision number: {0}")]
pub struct RevNumError(String);

impl RevNum {
    pub fn parts(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for RevNum {
    type Err = RevNumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<u32>, ParseIntError>>()
            .map(Self)
            .map_err(|_| RevNumError(s.into()))
    }
}

impl Display for RevNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = self.0.iter();
        if let Some(first) = parts.next() {
            write!(f, "{}", first)?;
        }
        for part in parts {
            write!(f, ".{}", part)?;
        }
        Ok(())
    }
}

/// Seconds between the RCS epoch (1900-01-01T00:00:00Z) and the Unix
/// epoch.
pub const RCS_EPOCH_SHIFT: i64 = 2_208_988_800;

/// A timestamp counted in seconds since the RCS epoch.
///
/// RCS dates revisions from 1900, which buys a 32-bit counter another 68
/// years past the Unix rollover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CvsTime(pub u32);

impl CvsTime {
    pub fn from_unix(seconds: i64) -> Option<Self> {
        u32::try_from(seconds + RCS_EPOCH_SHIFT).ok().map(Self)
    }

    pub fn to_unix(self) -> i64 {
        i64::from(self.0) - RCS_EPOCH_SHIFT
    }
}

/// One versioned file within a master.
///
/// Records are identity objects: two records with the same path are still
/// distinct files. Only the executable bit of `mode` is consumed
/// downstream.
#[derive(Debug, Clone)]
pub struct FileRev {
    pub path: Atom,
    pub mode: u32,
    pub number: RevNum,
}

/// Arena of file records, shared between the masters and the revision
/// list.
#[derive(Debug, Default)]
pub struct FileStore {
    files: Vec<FileRev>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: FileRev) -> FileId {
        let id = FileId::from(self.files.len());
        self.files.push(file);
        id
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Index<FileId> for FileStore {
    type Output = FileRev;

    fn index(&self, id: FileId) -> &FileRev {
        &self.files[usize::from(id)]
    }
}

/// Locator of one `@`-delimited text region within a master file.
///
/// `offset` addresses the opening `@`; `length` runs through the closing
/// `@` inclusive. Bodies stay on disk and are mapped lazily.
#[derive(Debug, Clone)]
pub struct TextRef {
    pub path: Atom,
    pub offset: u64,
    pub length: u64,
}

impl TextRef {
    pub(crate) fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// A delta payload: its text region plus the revision's log message.
#[derive(Debug, Clone)]
pub struct Patch {
    pub text: TextRef,
    pub log: String,
}

/// Version metadata attached to one node.
#[derive(Debug, Clone)]
pub struct Version {
    pub number: RevNum,
    pub author: String,
    pub state: String,
    pub date: CvsTime,
}

/// One vertex of a master's delta graph.
///
/// `to` advances along the current line of development, `down` enters the
/// first branch forked at this node, and `sib` chains further branches off
/// the same fork point. `file` is set on the nodes whose materialized text
/// becomes a blob.
#[derive(Debug, Clone)]
pub struct Node {
    pub version: Version,
    pub patch: Patch,
    pub file: Option<FileId>,
    pub down: Option<NodeId>,
    pub to: Option<NodeId>,
    pub sib: Option<NodeId>,
}

/// The in-memory delta graph of one master file.
#[derive(Debug)]
pub struct Master {
    /// Interned filesystem path of the master; patch regions are read from
    /// this file.
    pub name: Atom,
    /// The master's default keyword-expansion directive, if any.
    pub expand: Option<String>,
    pub head: Option<NodeId>,
    nodes: Vec<Node>,
}

impl Master {
    pub fn new(name: Atom, expand: Option<String>) -> Self {
        Self {
            name,
            expand,
            head: None,
            nodes: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[usize::from(id)]
    }
}

impl Index<NodeId> for Master {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[usize::from(id)]
    }
}

/// One whole-tree snapshot assembled from per-file commits.
#[derive(Debug, Clone)]
pub struct Commit {
    pub author: String,
    pub log: String,
    pub date: CvsTime,
    pub parent: Option<CommitId>,
    /// True on the last commit a branch owns; the rest of the parent chain
    /// belongs to the branch this one forked from.
    pub tail: bool,
    /// Packed file set, one entry per directory-prefix run.
    pub dirs: Vec<DirId>,
}

/// A named line of development.
#[derive(Debug, Clone)]
pub struct Head {
    pub name: String,
    pub commit: CommitId,
    /// True when the branch is fully covered by another branch's commits;
    /// such heads are skipped during emission but still get a reset.
    pub tail: bool,
}

/// A name attached to one commit.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub commit: CommitId,
}

/// The assembled whole-repository history handed to the orchestrator.
#[derive(Debug, Default)]
pub struct RevList {
    pub heads: Vec<Head>,
    pub tags: Vec<Tag>,
    pub dirs: DirStore,
    commits: Vec<Commit>,
}

impl RevList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_commit(&mut self, commit: Commit) -> CommitId {
        let id = CommitId::from(self.commits.len());
        self.commits.push(commit);
        id
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }
}

impl Index<CommitId> for RevList {
    type Output = Commit;

    fn index(&self, id: CommitId) -> &Commit {
        &self.commits[usize::from(id)]
    }
}

/// The resolved identity for one CVS login.
#[derive(Debug, Clone)]
pub struct AuthorEntry {
    pub full: String,
    pub email: String,
    pub timezone: Option<String>,
}

/// Output of the author-lookup collaborator: login → identity.
#[derive(Debug, Clone, Default)]
pub struct AuthorMap {
    map: HashMap<String, AuthorEntry>,
}

impl AuthorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, login: &str, entry: AuthorEntry) {
        self.map.insert(login.into(), entry);
    }

    pub fn lookup(&self, login: &str) -> Option<&AuthorEntry> {
        self.map.get(login)
    }
}
