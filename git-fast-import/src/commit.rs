use std::{
    fmt::{Display, Write as _},
    io,
};

use crate::{Command, Error, Identity, Mark};

/// A `commit` fast-import command.
#[derive(Debug)]
pub struct Commit {
    branch_ref: String,
    committer: Identity,
    message: String,
    from: Option<Parent>,
    commands: Vec<FileCommand>,
    property: Option<Property>,
}

impl Command for Commit {
    fn write(&self, writer: &mut impl io::Write, mark: Mark) -> Result<(), Error> {
        // Build up a buffer and then write.
        let mut buf = String::new();
        write!(buf, "commit {}\n", self.branch_ref)?;
        write!(buf, "mark {}\n", mark)?;
        write!(buf, "committer {}\n", self.committer)?;
        write!(buf, "data {}\n{}\n", self.message.len(), self.message)?;
        if let Some(from) = &self.from {
            write!(buf, "from {}\n", from)?;
        }
        for command in self.commands.iter() {
            write!(buf, "{}\n", command)?;
        }
        if let Some(property) = &self.property {
            write!(
                buf,
                "property {} {} {}",
                property.name,
                property.value.len(),
                property.value
            )?;
        }
        write!(buf, "\n")?;

        Ok(write!(writer, "{}", buf)?)
    }
}

#[derive(Debug)]
pub struct CommitBuilder {
    branch_ref: String,
    committer: Option<Identity>,
    message: Option<String>,
    from: Option<Parent>,
    commands: Vec<FileCommand>,
    property: Option<Property>,
}

impl CommitBuilder {
    pub fn new(branch_ref: String) -> Self {
        Self {
            branch_ref,
            committer: None,
            message: None,
            from: None,
            commands: Vec::new(),
            property: None,
        }
    }

    pub fn committer(&mut self, committer: Identity) -> &mut Self {
        self.committer = Some(committer);
        self
    }

    pub fn message(&mut self, message: String) -> &mut Self {
        self.message = Some(message);
        self
    }

    pub fn from(&mut self, from: Parent) -> &mut Self {
        self.from = Some(from);
        self
    }

    pub fn add_file_command(&mut self, command: FileCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn property(&mut self, property: Property) -> &mut Self {
        self.property = Some(property);
        self
    }

    pub fn build(self) -> Result<Commit, Error> {
        let committer = match self.committer {
            Some(committer) => committer,
            None => {
                return Err(Error::MissingCommitter);
            }
        };
        let message = match self.message {
            Some(message) => message,
            None => {
                return Err(Error::MissingCommitMessage);
            }
        };

        Ok(Commit {
            branch_ref: self.branch_ref,
            committer,
            message,
            from: self.from,
            commands: self.commands,
            property: self.property,
        })
    }
}

/// The `from` target of a commit: a mark, or an existing ref when a stream
/// is appended to a repository that already has the history before it.
#[derive(Debug, Clone)]
pub enum Parent {
    Mark(Mark),
    Ref(String),
}

impl Display for Parent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parent::Mark(mark) => write!(f, "{}", mark),
            Parent::Ref(branch_ref) => write!(f, "{}", branch_ref),
        }
    }
}

/// A `property` line as understood by repository-surgery tools.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum FileCommand {
    Modify {
        mode: Mode,
        mark: Mark,
        path: String,
    },
    Delete {
        path: String,
    },
}

impl Display for FileCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileCommand::Modify { mode, mark, path } => write!(f, "M {} {} {}", mode, mark, path),
            FileCommand::Delete { path } => write!(f, "D {}", path),
        }
    }
}

/// The file modes a fast-import stream can carry for regular files.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Executable,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Normal => write!(f, "100644"),
            Mode::Executable => write!(f, "100755"),
        }
    }
}
