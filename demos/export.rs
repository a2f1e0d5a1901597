//! Builds a tiny two-revision master on disk and streams its export to
//! stdout, mostly as a smoke test for the whole pipeline:
//!
//! ```sh
//! cargo run --example export | git fast-import
//! ```

use std::{fs, io};

use git_cvs_fast_export::{
    Atom, AtomTable, Commit, CvsTime, ExportOptions, ExportSession, FileRev, FileStore, Head,
    Master, Node, Patch, RevList, TextRef, Version,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opt {
    #[structopt(long, help = "fabricate monotonic commit dates")]
    force_dates: bool,

    #[structopt(long, help = "attach cvs-revision properties for reposurgeon")]
    reposurgeon: bool,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    flexi_logger::Logger::try_with_env_or_str("info")?.start()?;

    let dir = tempfile::tempdir()?;
    let mut atoms = AtomTable::new();
    let mut files = FileStore::new();
    let mut rl = RevList::new();

    // Revision 1.2 is the tip ("hello, world\n"); 1.1 drops the greeting.
    let master_path = dir.path().join("hello.c,v");
    let name = atoms.intern(master_path.to_str().expect("temp path is UTF-8"));
    let segments: Vec<Vec<u8>> = vec![b"hello, world\n".to_vec(), b"d1 1\na1 1\nhello\n".to_vec()];
    let texts = write_master(&master_path, &name, &segments)?;

    let fr_path = atoms.intern("hello.c,v");
    let f12 = files.add(FileRev {
        path: fr_path.clone(),
        mode: 0o644,
        number: "1.2".parse()?,
    });
    let f11 = files.add(FileRev {
        path: fr_path,
        mode: 0o644,
        number: "1.1".parse()?,
    });

    let mut master = Master::new(name, None);
    let n11 = master.add_node(Node {
        version: version("1.1", 1_600_000_000)?,
        patch: Patch {
            text: texts[1].clone(),
            log: String::from("initial revision\n"),
        },
        file: Some(f11),
        down: None,
        to: None,
        sib: None,
    });
    let n12 = master.add_node(Node {
        version: version("1.2", 1_600_000_600)?,
        patch: Patch {
            text: texts[0].clone(),
            log: String::from("say hello properly\n"),
        },
        file: Some(f12),
        down: None,
        to: Some(n11),
        sib: None,
    });
    master.head = Some(n12);

    let dirs = rl.dirs.pack(vec![f11], &files);
    let c1 = rl.add_commit(Commit {
        author: String::from("demo"),
        log: String::from("initial revision"),
        date: CvsTime::from_unix(1_600_000_000).expect("date in range"),
        parent: None,
        tail: false,
        dirs,
    });
    let dirs = rl.dirs.pack(vec![f12], &files);
    let c2 = rl.add_commit(Commit {
        author: String::from("demo"),
        log: String::from("say hello properly"),
        date: CvsTime::from_unix(1_600_000_600).expect("date in range"),
        parent: Some(c1),
        tail: false,
        dirs,
    });
    rl.heads.push(Head {
        name: String::from("master"),
        commit: c2,
        tail: false,
    });

    let opts = ExportOptions {
        force_dates: opt.force_dates,
        reposurgeon: opt.reposurgeon,
        ..ExportOptions::default()
    };
    let stdout = io::stdout();
    let mut session = ExportSession::new(opts, stdout.lock())?;
    session.generate(&master)?;
    session.export(&rl, &files)?;

    Ok(())
}

fn version(number: &str, date: i64) -> anyhow::Result<Version> {
    Ok(Version {
        number: number.parse()?,
        author: String::from("demo"),
        state: String::from("Exp"),
        date: CvsTime::from_unix(date).expect("date in range"),
    })
}

fn write_master(
    path: &std::path::Path,
    name: &Atom,
    segments: &[Vec<u8>],
) -> anyhow::Result<Vec<TextRef>> {
    let mut data = Vec::new();
    let mut refs = Vec::new();
    for segment in segments {
        let offset = data.len() as u64;
        data.push(b'@');
        for &b in segment {
            data.push(b);
            if b == b'@' {
                data.push(b'@');
            }
        }
        data.push(b'@');
        refs.push(TextRef {
            path: name.clone(),
            offset,
            length: data.len() as u64 - offset,
        });
    }
    fs::write(path, &data)?;
    Ok(refs)
}
