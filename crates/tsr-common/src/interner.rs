//! String interning for identifier deduplication.
//!
//! Identifiers, property names, and module specifiers appear many times
//! per compilation; interning makes them 4-byte copyable handles with
//! O(1) equality.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// An interned string handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom(pub u32);

impl Atom {
    pub const EMPTY: Atom = Atom(0);
}

/// A string interner.
///
/// The empty string is pre-interned as `Atom::EMPTY`.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    map: FxHashMap<Box<str>, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            strings: Vec::new(),
            map: FxHashMap::default(),
        };
        interner.intern("");
        interner
    }

    /// Intern a string, returning its handle.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.map.get(s) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, atom);
        atom
    }

    /// Resolve a handle back to its string.
    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    /// Look up a string without interning it.
    pub fn lookup(&self, s: &str) -> Option<Atom> {
        self.map.get(s).copied()
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        let c = interner.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "foo");
        assert_eq!(interner.resolve(c), "bar");
    }

    #[test]
    fn empty_string_is_pre_interned() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern(""), Atom::EMPTY);
        assert_eq!(interner.resolve(Atom::EMPTY), "");
    }
}
