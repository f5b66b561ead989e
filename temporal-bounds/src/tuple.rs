//! Tuple sets are the currency of bounds: every lower, upper or
//! target bound is a set of same-arity tuples of atoms, all drawn
//! from one universe.
//!
//! Internally, tuples are vectors of atom indices in the owning
//! universe; callers only ever see atoms.  Hoisting the universe and
//! arity out of each tuple lets us check compatibility once per set,
//! rather than once per element.
use crate::universe::same_universe;
use crate::Atom;
use crate::BoundsError;
use crate::Universe;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct TupleSet {
    universe: Arc<Universe>,
    arity: usize,
    tuples: BTreeSet<Vec<usize>>,
}

impl TupleSet {
    /// Returns an empty set of `arity`-tuples over `universe`.
    ///
    /// # Panics
    ///
    /// Panics if `arity` is 0: relations always have at least one
    /// column.
    #[must_use]
    pub fn none_of(universe: &Arc<Universe>, arity: usize) -> Self {
        assert!(arity > 0, "tuple sets must have a positive arity");
        Self {
            universe: universe.clone(),
            arity,
            tuples: BTreeSet::new(),
        }
    }

    /// Returns the set of all `tuples`, which must have `arity`
    /// atoms each.
    ///
    /// # Errors
    ///
    /// Returns `Err` on arity mismatches, or for atoms outside
    /// `universe`.
    pub fn from_tuples<I, T>(
        universe: &Arc<Universe>,
        arity: usize,
        tuples: I,
    ) -> Result<Self, BoundsError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[Atom]>,
    {
        let mut ret = Self::none_of(universe, arity);
        for tuple in tuples {
            ret.add(tuple.as_ref())?;
        }

        Ok(ret)
    }

    /// Returns a set that contains exactly `tuple`.
    ///
    /// # Errors
    ///
    /// Returns `Err` when `tuple` is empty or mentions an atom outside
    /// `universe`.
    pub fn singleton(universe: &Arc<Universe>, tuple: &[Atom]) -> Result<Self, BoundsError> {
        if tuple.is_empty() {
            return Err(BoundsError::ArityMismatch {
                expected: 1,
                found: 0,
            });
        }

        Self::from_tuples(universe, tuple.len(), std::iter::once(tuple))
    }

    /// Returns the unary set of every atom whose index lies between
    /// `from`'s and `to`'s, inclusively.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either atom is missing, or if `to` precedes
    /// `from`.
    pub fn range(universe: &Arc<Universe>, from: &Atom, to: &Atom) -> Result<Self, BoundsError> {
        let lo = universe
            .index(from)
            .ok_or_else(|| BoundsError::UnknownAtom(from.to_string()))?;
        let hi = universe
            .index(to)
            .ok_or_else(|| BoundsError::UnknownAtom(to.to_string()))?;
        if hi < lo {
            return Err(BoundsError::EmptyRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let mut ret = Self::none_of(universe, 1);
        ret.tuples.extend((lo..=hi).map(|i| vec![i]));
        Ok(ret)
    }

    #[must_use]
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Adds `tuple` to the set, and returns whether it was new.
    ///
    /// # Errors
    ///
    /// Returns `Err` on arity mismatch or unknown atoms.
    pub fn add(&mut self, tuple: &[Atom]) -> Result<bool, BoundsError> {
        let indices = self.indices_of(tuple)?;
        Ok(self.tuples.insert(indices))
    }

    #[must_use]
    pub fn contains(&self, tuple: &[Atom]) -> bool {
        match self.indices_of(tuple) {
            Ok(indices) => self.tuples.contains(&indices),
            Err(_) => false,
        }
    }

    /// Iterates over the tuples in the set, in index order.
    pub fn iter(&self) -> impl Iterator<Item = Vec<Atom>> + '_ {
        self.tuples.iter().map(move |tuple| {
            tuple
                .iter()
                .map(|&i| self.universe.atom(i).clone())
                .collect()
        })
    }

    /// Returns the Cartesian product of `self` and `other`: the
    /// concatenation of every tuple in `self` with every tuple in
    /// `other`.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the sets live in different universes.
    pub fn product(&self, other: &TupleSet) -> Result<TupleSet, BoundsError> {
        self.check_universe(other)?;

        let mut ret = Self::none_of(&self.universe, self.arity + other.arity);
        for x in &self.tuples {
            for y in &other.tuples {
                let mut tuple = Vec::with_capacity(ret.arity);
                tuple.extend_from_slice(x);
                tuple.extend_from_slice(y);
                ret.tuples.insert(tuple);
            }
        }

        Ok(ret)
    }

    /// Returns the union of `self` and `other`.
    ///
    /// # Errors
    ///
    /// Returns `Err` for incompatible universes or arities.
    pub fn union(&self, other: &TupleSet) -> Result<TupleSet, BoundsError> {
        self.check_compatible(other)?;

        let mut ret = self.clone();
        ret.tuples.extend(other.tuples.iter().cloned());
        Ok(ret)
    }

    /// Returns true iff every tuple in `self` is also in `other`.
    /// Incompatible sets are only comparable when `self` is empty.
    #[must_use]
    pub fn is_subset(&self, other: &TupleSet) -> bool {
        if self.is_empty() {
            return true;
        }

        self.check_compatible(other).is_ok() && self.tuples.is_subset(&other.tuples)
    }

    pub(crate) fn index_tuples(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.tuples.iter().map(Vec::as_slice)
    }

    /// Inserts a tuple of indices that the caller has already
    /// checked against this set's universe.
    pub(crate) fn insert_indices(&mut self, tuple: Vec<usize>) {
        debug_assert_eq!(tuple.len(), self.arity);
        debug_assert!(tuple.iter().all(|&i| i < self.universe.size()));
        self.tuples.insert(tuple);
    }

    pub(crate) fn check_universe(&self, other: &TupleSet) -> Result<(), BoundsError> {
        if same_universe(&self.universe, &other.universe) {
            Ok(())
        } else {
            Err(BoundsError::UniverseMismatch)
        }
    }

    fn check_compatible(&self, other: &TupleSet) -> Result<(), BoundsError> {
        self.check_universe(other)?;
        if self.arity != other.arity {
            return Err(BoundsError::ArityMismatch {
                expected: self.arity,
                found: other.arity,
            });
        }

        Ok(())
    }

    fn indices_of(&self, tuple: &[Atom]) -> Result<Vec<usize>, BoundsError> {
        if tuple.len() != self.arity {
            return Err(BoundsError::ArityMismatch {
                expected: self.arity,
                found: tuple.len(),
            });
        }

        tuple
            .iter()
            .map(|atom| {
                self.universe
                    .index(atom)
                    .ok_or_else(|| BoundsError::UnknownAtom(atom.to_string()))
            })
            .collect()
    }
}

impl PartialEq for TupleSet {
    fn eq(&self, other: &Self) -> bool {
        self.arity == other.arity
            && self.tuples == other.tuples
            && same_universe(&self.universe, &other.universe)
    }
}

impl Eq for TupleSet {}

impl fmt::Debug for TupleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|tuple| {
                tuple
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("->")
            }))
            .finish()
    }
}

#[cfg(test)]
fn test_universe() -> Arc<Universe> {
    Arc::new(Universe::new(crate::universe::atoms(&["a", "b", "c", "d"])).expect("ok"))
}

#[test]
fn test_range() {
    let universe = test_universe();
    let range = TupleSet::range(&universe, &"b".into(), &"d".into()).expect("ok");

    assert_eq!(range.len(), 3);
    assert!(range.contains(&["c".into()]));
    assert!(!range.contains(&["a".into()]));

    assert!(TupleSet::range(&universe, &"d".into(), &"b".into()).is_err());
    assert!(TupleSet::range(&universe, &"a".into(), &"z".into()).is_err());
}

#[test]
fn test_add_checks_shape() {
    let universe = test_universe();
    let mut set = TupleSet::none_of(&universe, 2);

    assert!(set.add(&["a".into(), "b".into()]).expect("ok"));
    assert!(!set.add(&["a".into(), "b".into()]).expect("ok"));
    assert!(set.add(&["a".into()]).is_err());
    assert!(set.add(&["a".into(), "z".into()]).is_err());
    assert_eq!(set.len(), 1);
}

#[test]
fn test_product() {
    let universe = test_universe();
    let xs = TupleSet::from_tuples(&universe, 1, vec![vec![Atom::new("a")], vec!["b".into()]])
        .expect("ok");
    let ys = TupleSet::from_tuples(
        &universe,
        2,
        vec![vec![Atom::new("c"), "d".into()], vec!["d".into(), "c".into()]],
    )
    .expect("ok");

    let product = xs.product(&ys).expect("ok");
    assert_eq!(product.arity(), 3);
    assert_eq!(product.len(), 4);
    assert!(product.contains(&["b".into(), "d".into(), "c".into()]));

    // Anything times the empty set is empty.
    let empty = TupleSet::none_of(&universe, 1);
    assert!(xs.product(&empty).expect("ok").is_empty());
}

#[test]
fn test_subset_and_union() {
    let universe = test_universe();
    let small = TupleSet::singleton(&universe, &["a".into()]).expect("ok");
    let large = TupleSet::range(&universe, &"a".into(), &"c".into()).expect("ok");

    assert!(small.is_subset(&large));
    assert!(!large.is_subset(&small));
    assert_eq!(small.union(&large).expect("ok"), large);

    let binary = TupleSet::none_of(&universe, 2);
    assert!(binary.is_subset(&small));
    assert!(small.union(&binary).is_err());
}

#[test]
fn test_mixed_universes() {
    let universe = test_universe();
    let other = Arc::new(Universe::new(crate::universe::atoms(&["a", "b"])).expect("ok"));

    let x = TupleSet::singleton(&universe, &["a".into()]).expect("ok");
    let y = TupleSet::singleton(&other, &["a".into()]).expect("ok");

    assert_ne!(x, y);
    assert!(x.product(&y).is_err());
    assert!(!x.is_subset(&y));
}
