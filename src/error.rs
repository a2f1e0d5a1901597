use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("branch nesting deeper than {0} frames")]
    BranchDepth(usize),

    #[error("delta application failed: {0}")]
    Delta(#[from] rcs_ed::ScriptError),

    #[error("file name {0} too long")]
    FileNameTooLong(String),

    #[error("patch text {path} does not belong to master {master}")]
    ForeignPatch { master: String, path: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal: {0} was never materialized")]
    MissingSerial(String),

    #[error("patch region of {0} lies outside the mapped file")]
    PatchBounds(String),

    #[error("illegal patch text: {0}")]
    Quoted(#[from] rcs_ed::QuotedError),

    #[error(transparent)]
    Stream(#[from] git_fast_import::Error),

    #[error("internal: serial {0} has no assigned mark")]
    UnassignedMark(usize),
}
