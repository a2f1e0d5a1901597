use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use rcs_ed::{edit, enter, unescaped, GapBuffer, Quoted, Span};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opt {
    #[structopt(parse(from_os_str), help = "file containing an RCS ed script")]
    script: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    // The engine edits spans into a single backing slice, the way a mapped
    // master behaves, so quote the base text and the script into one
    // buffer.
    let mut base = Vec::new();
    io::stdin().read_to_end(&mut base)?;

    let mut data = Vec::new();
    let base_region = quote(&mut data, &base);
    let script_region = quote(&mut data, &fs::read(opt.script)?);

    let mut buf = GapBuffer::<Span>::new();
    enter(&mut Quoted::new(&data, base_region, true)?, &mut buf)?;
    edit(&mut Quoted::new(&data, script_region, true)?, &mut buf)?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    for span in buf.iter() {
        stdout.write_all(&unescaped(&data[span.start..span.end]))?;
    }

    Ok(())
}

fn quote(out: &mut Vec<u8>, raw: &[u8]) -> std::ops::Range<usize> {
    let start = out.len();
    out.push(b'@');
    for &b in raw {
        out.push(b);
        if b == b'@' {
            out.push(b'@');
        }
    }
    out.push(b'@');
    start..out.len()
}
