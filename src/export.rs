//! Assemble per-file revisions into whole-tree commits and emit the
//! stream.
//!
//! The order the graph traversal produces is nothing like the canonical
//! order git-fast-export emits, and downstream comparison against other
//! tools wants the latter, so commits are laid out branch by branch,
//! checked for topological-vs-date consistency, and date-sorted when that
//! holds.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use git_fast_import::{
    Blob, CommitBuilder, FileCommand, Identity, Mark, Mode, Parent, Property, Writer,
};

use crate::{
    blobs::BlobStore,
    error::Error,
    graph::{AuthorMap, Commit, CommitId, FileId, FileStore, Head, Master, RevList},
    intern::Atom,
    textmap::TextMap,
};

/// Hard bound on canonicalized path names.
const MAX_PATH: usize = 4096;

/// Behavior switches for one export run.
#[derive(Debug)]
pub struct ExportOptions {
    /// Leading bytes stripped from every master path.
    pub strip: usize,
    /// Incremental cutoff: commits whose display date is at or before this
    /// Unix time are traversed but not reported. Zero disables.
    pub from_time: i64,
    /// Fabricate monotonic dates from mark indices, for reproducible
    /// streams.
    pub force_dates: bool,
    /// Emit branch by branch instead of in canonical date order. Faster
    /// and lighter, but the result cannot be compared against other
    /// exporters line by line.
    pub branch_order: bool,
    /// Attach `property cvs-revision` lines for repository-surgery tools.
    pub reposurgeon: bool,
    /// Where to write the `<path> <rev> :<mark>` side file, if anywhere.
    pub revision_map: Option<PathBuf>,
    /// Clustering constant for `force_dates`.
    pub commit_time_window: i64,
    /// Prefix for branch refs.
    pub branch_prefix: String,
    /// Expand `$Keyword$` markers while materializing.
    pub keyword_expansion: bool,
    /// Identity lookup produced by the author-map collaborator.
    pub authors: AuthorMap,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            strip: 0,
            from_time: 0,
            force_dates: false,
            branch_order: false,
            reposurgeon: false,
            revision_map: None,
            commit_time_window: 300,
            branch_prefix: String::from("refs/heads/"),
            keyword_expansion: true,
            authors: AuthorMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MarkSlot {
    external: usize,
    emitted: bool,
}

#[derive(Debug)]
enum FileOp {
    Modify {
        mode: Mode,
        serial: usize,
        path: String,
        file: FileId,
    },
    Delete {
        path: String,
    },
}

impl FileOp {
    fn path(&self) -> &str {
        match self {
            FileOp::Modify { path, .. } => path,
            FileOp::Delete { path } => path,
        }
    }
}

/// One export run.
///
/// Owns the blob cache, the mmap window, the serial and mark counters, and
/// the dense serial→mark table; nothing the run needs is process-global.
pub struct ExportSession<W: Write> {
    opts: ExportOptions,
    out: Writer<W>,
    blobs: BlobStore,
    texts: TextMap,
    seqno: usize,
    mark: usize,
    file_serials: Vec<usize>,
    commit_serials: Vec<usize>,
    markmap: Vec<MarkSlot>,
    revision_map: Option<BufWriter<File>>,
}

impl<W: Write> ExportSession<W> {
    pub fn new(opts: ExportOptions, sink: W) -> Result<Self, Error> {
        let revision_map = match &opts.revision_map {
            Some(path) => Some(BufWriter::new(File::create(path)?)),
            None => None,
        };
        Ok(Self {
            opts,
            out: Writer::new(sink),
            blobs: BlobStore::new()?,
            texts: TextMap::new(),
            seqno: 0,
            mark: 0,
            file_serials: Vec::new(),
            commit_serials: Vec::new(),
            markmap: Vec::new(),
            revision_map,
        })
    }

    /// Materializes one master, saving every emitted revision to the blob
    /// cache and assigning its serial.
    pub fn generate(&mut self, master: &Master) -> Result<(), Error> {
        let Self {
            opts,
            blobs,
            texts,
            seqno,
            file_serials,
            ..
        } = self;
        crate::generate::generate(
            master,
            opts.keyword_expansion,
            texts,
            &mut |file, _node, text| {
                *seqno += 1;
                let idx = usize::from(file);
                if file_serials.len() <= idx {
                    file_serials.resize(idx + 1, 0);
                }
                file_serials[idx] = *seqno;
                blobs.write(*seqno, text)?;
                Ok(())
            },
        )?;
        log::debug!("generated blobs for {}", master.name);
        Ok(())
    }

    /// Emits the assembled history and terminates the stream.
    pub fn export(mut self, rl: &RevList, files: &FileStore) -> Result<(), Error> {
        let total = exported_commit_count(rl);
        log::debug!("exporting {} commits", total);

        // Mark indices are serial-keyed and 1-origin; slot 0 stays empty.
        self.markmap = vec![MarkSlot::default(); self.seqno + total + 1];
        self.commit_serials = vec![0; rl.commit_count()];

        if self.opts.branch_order {
            self.export_branch_order(rl, files)?;
        } else {
            self.export_canonical(rl, files)?;
        }

        for head in &rl.heads {
            let serial = self.commit_serials[usize::from(head.commit)];
            let external = self.markmap[serial].external;
            if external == 0 {
                return Err(Error::UnassignedMark(serial));
            }
            self.out.reset(
                &format!("{}{}", self.opts.branch_prefix, head.name),
                Some(Mark::from(external)),
            )?;
        }

        if let Some(map) = self.revision_map.as_mut() {
            map.flush()?;
        }
        self.out.done()?;
        Ok(())
    }

    /// Canonical mode: one dense array, branch spans oldest-to-newest,
    /// then a date sort when topology allows it.
    fn export_canonical(&mut self, rl: &RevList, files: &FileStore) -> Result<(), Error> {
        struct Seq {
            commit: CommitId,
            head: usize,
            realized: bool,
        }

        let mut history: Vec<Seq> = Vec::new();
        for (hidx, head) in rl.heads.iter().enumerate() {
            if head.tail {
                continue;
            }
            let base = history.len();
            for id in branch_commits(rl, head) {
                history.push(Seq {
                    commit: id,
                    head: hidx,
                    realized: false,
                });
            }
            // The chain arrives newest first; every branch span must run
            // oldest to newest so ancestor marks precede their children.
            history[base..].reverse();
        }

        let mut sortable = true;
        for seq in &history {
            let commit = &rl[seq.commit];
            if let Some(parent) = commit.parent {
                if rl[parent].date > commit.date {
                    sortable = false;
                    log::warn!("some parent commits are younger than their children");
                    break;
                }
            }
        }
        if sortable {
            history.sort_by_key(|seq| rl[seq.commit].date);
        }

        for i in 0..history.len() {
            let (id, head_idx) = (history[i].commit, history[i].head);
            let commit = &rl[id];
            let mut report = true;
            let mut parent_unreported = false;
            if self.opts.from_time > 0 {
                if self.opts.from_time >= self.display_date(commit, self.mark + 1) {
                    report = false;
                } else if !history[i].realized {
                    parent_unreported = self.parent_unreported(rl, commit);
                    for seq in history[i..].iter_mut() {
                        if seq.head == head_idx {
                            seq.realized = true;
                        }
                    }
                }
            }
            self.export_commit(rl, files, id, head_idx, report, parent_unreported)?;
            self.emit_tags(rl, id)?;
        }
        Ok(())
    }

    /// Branch-order mode: each non-tail branch in head order, oldest to
    /// newest.
    fn export_branch_order(&mut self, rl: &RevList, files: &FileStore) -> Result<(), Error> {
        for (hidx, head) in rl.heads.iter().enumerate() {
            if head.tail {
                continue;
            }
            let mut realized = false;
            for id in branch_commits(rl, head).into_iter().rev() {
                let commit = &rl[id];
                let mut report = true;
                let mut parent_unreported = false;
                if self.opts.from_time > 0 {
                    if self.opts.from_time >= self.display_date(commit, self.mark + 1) {
                        report = false;
                    } else if !realized {
                        parent_unreported = self.parent_unreported(rl, commit);
                        realized = true;
                    }
                }
                self.export_commit(rl, files, id, hidx, report, parent_unreported)?;
                self.emit_tags(rl, id)?;
            }
        }
        Ok(())
    }

    /// Exports one commit and the blobs it is the first to reference.
    fn export_commit(
        &mut self,
        rl: &RevList,
        files: &FileStore,
        id: CommitId,
        head_idx: usize,
        report: bool,
        parent_unreported: bool,
    ) -> Result<(), Error> {
        let commit = &rl[id];
        let branch = &rl.heads[head_idx].name;
        let mut ops = self.compute_operations(rl, files, commit)?;

        // Pairs follow the commit's own file order, not the sorted op
        // order.
        let mut revpairs = String::new();
        if self.opts.reposurgeon || self.revision_map.is_some() {
            for op in &ops {
                if let FileOp::Modify { path, file, .. } = op {
                    revpairs.push_str(&format!("{} {}\n", path, files[*file].number));
                }
            }
        }

        // Assign marks to (and, when reporting, ship) blobs the stream has
        // not seen yet.
        for op in &ops {
            if let FileOp::Modify { serial, .. } = op {
                if !self.markmap[*serial].emitted {
                    self.mark += 1;
                    self.markmap[*serial].external = self.mark;
                    if report {
                        let blob = Blob::new(self.blobs.take(*serial)?);
                        self.out.command(Mark::from(self.mark), &blob)?;
                        self.markmap[*serial].emitted = true;
                    }
                }
            }
        }

        if report {
            if let Some(map) = self.revision_map.as_mut() {
                for op in &ops {
                    if let FileOp::Modify { serial, path, file, .. } = op {
                        writeln!(
                            map,
                            "{} {} :{}",
                            path,
                            files[*file].number,
                            self.markmap[*serial].external
                        )?;
                    }
                }
            }
        }

        ops.sort_by(|a, b| sentinel_cmp(a.path(), b.path()));

        self.seqno += 1;
        self.commit_serials[usize::from(id)] = self.seqno;
        self.mark += 1;
        self.markmap[self.seqno].external = self.mark;
        let mark = self.mark;

        if !report {
            return Ok(());
        }

        let (full, email, timezone) = match self.opts.authors.lookup(&commit.author) {
            Some(entry) => (
                entry.full.as_str(),
                entry.email.as_str(),
                entry.timezone.as_deref(),
            ),
            None => (commit.author.as_str(), commit.author.as_str(), None),
        };
        let when = self.display_date(commit, mark);

        let mut builder = CommitBuilder::new(format!("{}{}", self.opts.branch_prefix, branch));
        builder
            .committer(Identity::new(full, email, when, timezone))
            .message(commit.log.clone());
        if let Some(parent) = commit.parent {
            if parent_unreported {
                // The parent predates the cutoff, so its mark is not in
                // this stream; synchronize on the existing branch tip
                // instead.
                builder.from(Parent::Ref(format!(
                    "{}{}^0",
                    self.opts.branch_prefix, branch
                )));
            } else {
                let parent_serial = self.commit_serials[usize::from(parent)];
                let external = self.markmap[parent_serial].external;
                if external == 0 {
                    return Err(Error::UnassignedMark(parent_serial));
                }
                builder.from(Parent::Mark(Mark::from(external)));
            }
        }
        for op in ops {
            match op {
                FileOp::Modify {
                    mode, serial, path, ..
                } => {
                    builder.add_file_command(FileCommand::Modify {
                        mode,
                        mark: Mark::from(self.markmap[serial].external),
                        path,
                    });
                }
                FileOp::Delete { path } => {
                    builder.add_file_command(FileCommand::Delete { path });
                }
            }
        }
        if self.opts.reposurgeon {
            builder.property(Property {
                name: String::from("cvs-revision"),
                value: revpairs,
            });
        }
        self.out.command(Mark::from(mark), &builder.build()?)?;
        Ok(())
    }

    /// Computes this commit's M/D operations against its parent.
    ///
    /// Matching goes through a path-keyed side table over the parent's
    /// files; interned paths make the key comparison an identity check.
    fn compute_operations(
        &self,
        rl: &RevList,
        files: &FileStore,
        commit: &Commit,
    ) -> Result<Vec<FileOp>, Error> {
        let parent = commit.parent.map(|id| &rl[id]);
        let parent_files: HashMap<Atom, FileId> = match parent {
            Some(parent) => commit_files(rl, parent)
                .map(|file| (files[file].path.clone(), file))
                .collect(),
            None => HashMap::new(),
        };

        let mut ops = Vec::new();
        let mut child_paths = HashSet::new();
        for file in commit_files(rl, commit) {
            let record = &files[file];
            child_paths.insert(record.path.clone());

            let other = parent_files.get(&record.path);
            let present = other.is_some();
            let changed = match other {
                Some(other) => self.serial_of(file) != self.serial_of(*other),
                None => false,
            };
            if !present || changed {
                let serial = self.serial_of(file);
                if serial == 0 {
                    return Err(Error::MissingSerial(record.path.to_string()));
                }
                ops.push(FileOp::Modify {
                    // git fast-import only supports the 644 and 755 file
                    // modes.
                    mode: if record.mode & 0o100 != 0 {
                        Mode::Executable
                    } else {
                        Mode::Normal
                    },
                    serial,
                    path: export_filename(record.path.as_str(), self.opts.strip)?,
                    file,
                });
            }
        }

        if parent.is_some() {
            for path in parent_files.keys() {
                if !child_paths.contains(path) {
                    ops.push(FileOp::Delete {
                        path: export_filename(path.as_str(), self.opts.strip)?,
                    });
                }
            }
        }

        Ok(ops)
    }

    fn emit_tags(&mut self, rl: &RevList, commit: CommitId) -> Result<(), Error> {
        let serial = self.commit_serials[usize::from(commit)];
        for tag in rl.tags.iter().filter(|tag| tag.commit == commit) {
            let external = self.markmap[serial].external;
            self.out.reset(
                &format!("refs/tags/{}", tag.name),
                Some(Mark::from(external)),
            )?;
        }
        Ok(())
    }

    fn serial_of(&self, file: FileId) -> usize {
        self.file_serials
            .get(usize::from(file))
            .copied()
            .unwrap_or(0)
    }

    fn display_date(&self, commit: &Commit, mark: usize) -> i64 {
        if self.opts.force_dates {
            mark as i64 * self.opts.commit_time_window * 2
        } else {
            commit.date.to_unix()
        }
    }

    fn parent_unreported(&self, rl: &RevList, commit: &Commit) -> bool {
        match commit.parent {
            Some(parent) => {
                let serial = self.commit_serials[usize::from(parent)];
                let mark = self.markmap[serial].external;
                self.display_date(&rl[parent], mark) < self.opts.from_time
            }
            None => false,
        }
    }
}

/// All files of a commit, in packed-directory order.
fn commit_files<'a>(rl: &'a RevList, commit: &'a Commit) -> impl Iterator<Item = FileId> + 'a {
    commit
        .dirs
        .iter()
        .flat_map(move |dir| rl.dirs[*dir].files().iter().copied())
}

/// The commits a head owns, newest first.
fn branch_commits(rl: &RevList, head: &Head) -> Vec<CommitId> {
    let mut chain = Vec::new();
    let mut commit = Some(head.commit);
    while let Some(id) = commit {
        chain.push(id);
        let c = &rl[id];
        commit = if c.tail { None } else { c.parent };
    }
    chain
}

fn exported_commit_count(rl: &RevList) -> usize {
    rl.heads
        .iter()
        .filter(|head| !head.tail)
        .map(|head| branch_commits(rl, head).len())
        .sum()
}

/// Canonicalizes a master path for the output tree.
pub(crate) fn export_filename(name: &str, strip: usize) -> Result<String, Error> {
    let stripped = name.get(strip..).unwrap_or("");
    if stripped.len() >= MAX_PATH {
        return Err(Error::FileNameTooLong(name.to_string()));
    }
    let mut path = stripped.to_string();
    drop_path_component(&mut path, "Attic/");
    drop_path_component(&mut path, "RCS/");
    if path.len() > 2 && path.ends_with(",v") {
        path.truncate(path.len() - 2);
    }
    if path == ".cvsignore" {
        path = String::from(".gitignore");
    }
    Ok(path)
}

/// Removes whole `component` path components, wherever they sit.
fn drop_path_component(path: &mut String, component: &str) {
    while let Some(found) = path.find(component) {
        if found != 0 && path.as_bytes()[found - 1] != b'/' {
            break;
        }
        path.replace_range(found..found + component.len(), "");
    }
}

/// Sorts operations the way git fast-export does: a trailing `/` sentinel
/// joins the comparison so operations on files beneath a directory order
/// consistently against a sibling entry that replaces the directory.
fn sentinel_cmp(a: &str, b: &str) -> Ordering {
    a.bytes().chain(Some(b'/')).cmp(b.bytes().chain(Some(b'/')))
}
