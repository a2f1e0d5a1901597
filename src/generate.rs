//! Materialize every revision of one master through an emission hook.
//!
//! The delta graph stores reverse deltas: the head node carries the full
//! trunk tip and every step away from it is an edit script. Traversal
//! keeps an explicit stack of frames so entering a branch forks the
//! current line buffer and leaving one restores the fork point before the
//! next sibling is tried.

use rcs_ed::{edit, enter, unescaped, GapBuffer, Quoted, Span};

use crate::{
    error::Error,
    graph::{FileId, Master, Node, NodeId},
    keyword::{Expand, Expander},
    textmap::{PatchText, TextMap},
};

/// Upper bound on nested branch frames. CVS repositories deeper than this
/// have not been seen in the wild; refusing cleanly beats runaway memory.
pub const MAX_BRANCH_DEPTH: usize = 64;

enum Step {
    Enter,
    Edit,
}

struct Frame {
    node: NodeId,
    next_branch: Option<NodeId>,
    text: PatchText,
    buffer: GapBuffer<Span>,
}

/// Materializes every emitted revision of `master`, calling `emit` with
/// the file record, the node, and the finished text.
pub fn generate<F>(
    master: &Master,
    enable_keyword_expansion: bool,
    texts: &mut TextMap,
    emit: &mut F,
) -> Result<(), Error>
where
    F: FnMut(FileId, &Node, &[u8]) -> Result<(), Error>,
{
    let head = match master.head {
        Some(head) => head,
        None => return Ok(()),
    };
    let mode = if enable_keyword_expansion {
        Expand::from_directive(master.expand.as_deref())
    } else {
        Expand::Kk
    };
    let expandflag = mode.expands();

    let mut stack: Vec<Frame> = Vec::new();
    let mut frame = Frame {
        node: head,
        next_branch: None,
        text: load_node_text(master, head, texts)?,
        buffer: GapBuffer::new(),
    };
    apply_delta(&mut frame, Step::Enter)?;
    stack.push(frame);

    loop {
        let top = stack.last().unwrap();
        let node = &master[top.node];
        let down = node.down;

        if let Some(file) = node.file {
            let mut out = Vec::new();
            if expandflag {
                let mut expander = Expander::new(
                    mode,
                    enable_keyword_expansion,
                    master.name.as_str(),
                    &node.version,
                    &node.patch.log,
                );
                for span in top.buffer.iter() {
                    let mut line =
                        Quoted::new(top.text.data(), span.start..span.end, false)?;
                    expander.expand_line(&mut line, &mut out)?;
                }
            } else {
                for span in top.buffer.iter() {
                    out.extend_from_slice(&unescaped(
                        &top.text.data()[span.start..span.end],
                    ));
                }
            }
            emit(file, node, &out)?;
        }

        if let Some(down) = down {
            enter_branch(master, &mut stack, down, texts)?;
            continue;
        }

        loop {
            let top = stack.last_mut().unwrap();
            if let Some(next) = master[top.node].to {
                top.node = next;
                top.text = load_node_text(master, next, texts)?;
                apply_delta(top, Step::Edit)?;
                break;
            }
            // Branch exhausted: unwind, then resume with the popped
            // frame's sibling if it has one.
            let finished = stack.pop().unwrap();
            if stack.is_empty() {
                texts.unload_all();
                return Ok(());
            }
            if let Some(sib) = finished.next_branch {
                enter_branch(master, &mut stack, sib, texts)?;
                break;
            }
        }
    }
}

/// Pushes a frame for `node`, forking the current frame's materialized
/// state.
fn enter_branch(
    master: &Master,
    stack: &mut Vec<Frame>,
    node: NodeId,
    texts: &mut TextMap,
) -> Result<(), Error> {
    if stack.len() >= MAX_BRANCH_DEPTH {
        return Err(Error::BranchDepth(MAX_BRANCH_DEPTH));
    }
    let buffer = stack.last().unwrap().buffer.clone();
    let mut frame = Frame {
        node,
        next_branch: master[node].sib,
        text: load_node_text(master, node, texts)?,
        buffer,
    };
    apply_delta(&mut frame, Step::Edit)?;
    stack.push(frame);
    Ok(())
}

fn load_node_text(
    master: &Master,
    node: NodeId,
    texts: &mut TextMap,
) -> Result<PatchText, Error> {
    let text = &master[node].patch.text;
    // Spans from different deltas share one buffer, which is only sound
    // while every region lives in the master's own file.
    if text.path != master.name {
        return Err(Error::ForeignPatch {
            master: master.name.to_string(),
            path: text.path.to_string(),
        });
    }
    texts.load(text)
}

fn apply_delta(frame: &mut Frame, step: Step) -> Result<(), Error> {
    let mut q = Quoted::new(frame.text.data(), frame.text.range(), true)?;
    match step {
        Step::Enter => enter(&mut q, &mut frame.buffer)?,
        Step::Edit => edit(&mut q, &mut frame.buffer)?,
    }
    Ok(())
}
