//! A universe is an ordered set of opaque atoms.  Atoms carry their
//! identity with them (a label), so the same atom can live in several
//! universes at different positions; positions are only meaningful
//! relative to the universe that assigned them.
//!
//! Universes only ever grow by extension: `extend` returns a new
//! universe whose prefix is exactly the old one.
use crate::BoundsError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An `Atom` is an opaque, cheaply clonable identifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Atom(Arc<str>);

impl Atom {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self(label.into())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Atom {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Atom {
    fn from(label: String) -> Self {
        Self(label.into())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct Universe {
    atoms: Vec<Atom>,
    index: HashMap<Atom, usize>,
}

impl Universe {
    /// Returns a universe with `atoms`, in order.
    ///
    /// # Errors
    ///
    /// Returns `Err` when `atoms` is empty or contains duplicates.
    pub fn new<I>(atoms: I) -> Result<Self, BoundsError>
    where
        I: IntoIterator<Item = Atom>,
    {
        let mut ret = Self {
            atoms: Vec::new(),
            index: HashMap::new(),
        };

        ret.append(atoms)?;
        if ret.atoms.is_empty() {
            return Err(BoundsError::EmptyUniverse);
        }

        Ok(ret)
    }

    /// Returns a fresh universe with all of `self`'s atoms at the
    /// same indices, followed by `atoms`.
    ///
    /// # Errors
    ///
    /// Returns `Err` when one of `atoms` already exists.
    pub fn extend<I>(&self, atoms: I) -> Result<Self, BoundsError>
    where
        I: IntoIterator<Item = Atom>,
    {
        let mut ret = Self {
            atoms: self.atoms.clone(),
            index: self.index.clone(),
        };

        ret.append(atoms)?;
        Ok(ret)
    }

    fn append<I>(&mut self, atoms: I) -> Result<(), BoundsError>
    where
        I: IntoIterator<Item = Atom>,
    {
        for atom in atoms {
            if self.index.contains_key(&atom) {
                return Err(BoundsError::DuplicateAtom(atom.to_string()));
            }

            self.index.insert(atom.clone(), self.atoms.len());
            self.atoms.push(atom);
        }

        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    /// Returns the atom at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range.
    #[must_use]
    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }

    #[must_use]
    pub fn index(&self, atom: &Atom) -> Option<usize> {
        self.index.get(atom).copied()
    }

    #[must_use]
    pub fn contains(&self, atom: &Atom) -> bool {
        self.index.contains_key(atom)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> + '_ {
        self.atoms.iter()
    }
}

impl PartialEq for Universe {
    fn eq(&self, other: &Self) -> bool {
        self.atoms == other.atoms
    }
}

impl Eq for Universe {}

/// Universes are shared by every tuple set defined over them, so we
/// can usually tell them apart without looking at atoms.
#[must_use]
pub fn same_universe(x: &Arc<Universe>, y: &Arc<Universe>) -> bool {
    Arc::ptr_eq(x, y) || **x == **y
}

#[cfg(test)]
pub(crate) fn atoms(labels: &[&str]) -> Vec<Atom> {
    labels.iter().map(|x| Atom::new(x)).collect()
}

#[test]
fn test_universe_indices() {
    let universe = Universe::new(atoms(&["a", "b", "c"])).expect("ok");

    assert_eq!(universe.size(), 3);
    assert_eq!(universe.index(&"b".into()), Some(1));
    assert_eq!(universe.atom(2), &Atom::new("c"));
    assert!(!universe.contains(&"d".into()));
}

#[test]
fn test_universe_rejects_duplicates() {
    assert!(Universe::new(atoms(&["a", "b", "a"])).is_err());
    assert!(Universe::new(Vec::new()).is_err());
}

#[test]
fn test_extend_preserves_prefix() {
    let base = Universe::new(atoms(&["a", "b"])).expect("ok");
    let extended = base.extend(atoms(&["x", "y"])).expect("ok");

    assert_eq!(extended.size(), 4);
    for (index, atom) in base.iter().enumerate() {
        assert_eq!(extended.index(atom), Some(index));
    }

    // Extension never mutates the original.
    assert_eq!(base.size(), 2);
    assert!(base.extend(atoms(&["b"])).is_err());
}
