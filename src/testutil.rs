//! Helpers that lay out synthetic master files for materializer and
//! orchestrator tests.

use std::fs;

use tempfile::TempDir;

use crate::export::{ExportOptions, ExportSession};
use crate::graph::{
    Commit, CommitId, CvsTime, FileId, FileRev, FileStore, Master, Node, Patch, RevList, TextRef,
    Version,
};
use crate::intern::{Atom, AtomTable};

/// A scratch repository: a temp dir for master files plus the shared
/// arenas a loader would normally populate.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub atoms: AtomTable,
    pub files: FileStore,
    pub rl: RevList,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            atoms: AtomTable::new(),
            files: FileStore::new(),
            rl: RevList::new(),
        }
    }

    /// Writes `segments` as consecutive `@`-quoted regions into a master
    /// file named `name` and returns its interned path plus one `TextRef`
    /// per segment.
    pub(crate) fn master_text(
        &mut self,
        name: &str,
        segments: &[&[u8]],
    ) -> (Atom, Vec<TextRef>) {
        let path = self.dir.path().join(name);
        let atom = self.atoms.intern(path.to_str().unwrap());

        let mut data = Vec::new();
        let mut refs = Vec::new();
        for segment in segments {
            let offset = data.len() as u64;
            data.push(b'@');
            for &b in *segment {
                data.push(b);
                if b == b'@' {
                    data.push(b'@');
                }
            }
            data.push(b'@');
            refs.push(TextRef {
                path: atom.clone(),
                offset,
                length: data.len() as u64 - offset,
            });
        }
        fs::write(&path, &data).unwrap();
        (atom, refs)
    }
}

pub(crate) fn version(number: &str, author: &str, date: i64) -> Version {
    Version {
        number: number.parse().unwrap(),
        author: author.into(),
        state: String::from("Exp"),
        date: CvsTime::from_unix(date).unwrap(),
    }
}

/// Builds a linear trunk master whose segments are given tip first (the
/// tip's full text, then one reverse delta per older revision). Returns
/// the master plus the file records in the same tip-first order.
pub(crate) fn trunk_master(
    fx: &mut Fixture,
    master_name: &str,
    fr_path: &str,
    mode: u32,
    revs: &[(&str, &str, i64, &[u8])],
) -> (Master, Vec<FileId>) {
    let segments: Vec<&[u8]> = revs.iter().map(|rev| rev.3).collect();
    let (name, texts) = fx.master_text(master_name, &segments);
    let path = fx.atoms.intern(fr_path);

    let mut master = Master::new(name, None);
    let mut ids = vec![None; revs.len()];
    let mut next = None;
    for i in (0..revs.len()).rev() {
        let (number, author, date, _) = revs[i];
        let file = fx.files.add(FileRev {
            path: path.clone(),
            mode,
            number: number.parse().unwrap(),
        });
        ids[i] = Some(file);
        next = Some(master.add_node(Node {
            version: version(number, author, date),
            patch: Patch {
                text: texts[i].clone(),
                log: format!("{}\n", number),
            },
            file: Some(file),
            down: None,
            to: next,
            sib: None,
        }));
    }
    master.head = next;
    (master, ids.into_iter().map(Option::unwrap).collect())
}

/// Adds a commit whose file set is packed on the way in.
pub(crate) fn commit(
    fx: &mut Fixture,
    author: &str,
    log: &str,
    date: i64,
    parent: Option<CommitId>,
    tail: bool,
    files: Vec<FileId>,
) -> CommitId {
    let dirs = fx.rl.dirs.pack(files, &fx.files);
    fx.rl.add_commit(Commit {
        author: author.into(),
        log: log.into(),
        date: CvsTime::from_unix(date).unwrap(),
        parent,
        tail,
        dirs,
    })
}

/// Generates blobs for every master and exports the fixture's revision
/// list, returning the stream text.
pub(crate) fn run_export(opts: ExportOptions, masters: &[&Master], fx: &Fixture) -> String {
    let mut out = Vec::new();
    let mut session = ExportSession::new(opts, &mut out).unwrap();
    for master in masters {
        session.generate(master).unwrap();
    }
    session.export(&fx.rl, &fx.files).unwrap();
    String::from_utf8(out).unwrap()
}
