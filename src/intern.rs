use std::{
    collections::HashSet,
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    rc::Rc,
};

/// An interned path string.
///
/// Equality and hashing go by pointer identity: the directory packer and
/// the parent-link pass lean on every distinct path living in exactly one
/// allocation. Atoms therefore only come out of an [`AtomTable`], and atoms
/// from different tables must never meet.
#[derive(Clone)]
pub struct Atom(Rc<str>);

impl Atom {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// The interner all path strings pass through on their way in.
#[derive(Debug, Default)]
pub struct AtomTable {
    atoms: HashSet<Rc<str>>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical atom for `s`, creating it on first sight.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(existing) = self.atoms.get(s) {
            return Atom(existing.clone());
        }
        let atom: Rc<str> = Rc::from(s);
        self.atoms.insert(atom.clone());
        Atom(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_canonical() {
        let mut table = AtomTable::new();
        let a = table.intern("src/main.c,v");
        let b = table.intern("src/main.c,v");
        let c = table.intern("src/other.c,v");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "src/main.c,v");
    }

    #[test]
    fn test_hash_follows_identity() {
        use std::collections::HashMap;

        let mut table = AtomTable::new();
        let a = table.intern("x");
        let mut map = HashMap::new();
        map.insert(a.clone(), 1);
        assert_eq!(map.get(&table.intern("x")), Some(&1));
    }
}
