use std::fmt::Display;

use derive_more::{From, Into};

/// A stream-unique integer naming a blob or commit for later reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct Mark(usize);

impl Mark {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}", self.0)
    }
}
