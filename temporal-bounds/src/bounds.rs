//! Bounds map each relation to the tuple sets that may (upper) and
//! must (lower) appear in its value, over a single universe.  Lower
//! bounds are always subsets of the corresponding upper bound.
//!
//! Some bounds are only known symbolically when first declared, and
//! must be resolved to concrete tuple sets before anything can
//! consume them.  Preference-weighted solving also attaches an
//! optional target tuple set and weight to each relation.
//!
//! A bound set may carry a companion ("amalgamated") bound set: an
//! alternative, more precise, encoding of the same problem.
use crate::universe::same_universe;
use crate::BoundsError;
use crate::Relation;
use crate::TupleSet;
use crate::Universe;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// Flags that record how a bound set came to be.  We never interpret
/// them, but every transformation must carry them along.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Provenance {
    pub trivial_config: bool,
    pub integrated: bool,
    pub integration: bool,
}

#[derive(Clone, Debug)]
enum Bound {
    Concrete { lower: TupleSet, upper: TupleSet },
    Symbolic(String),
}

#[derive(Clone, Debug)]
struct RelationBound {
    bound: Bound,
    target: Option<TupleSet>,
    weight: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct Bounds {
    universe: Arc<Universe>,
    relations: IndexMap<Relation, RelationBound>,
    provenance: Provenance,
    amalgamated: Option<Box<Bounds>>,
}

impl Bounds {
    #[must_use]
    pub fn new(universe: Arc<Universe>) -> Self {
        Self {
            universe,
            relations: IndexMap::new(),
            provenance: Provenance::default(),
            amalgamated: None,
        }
    }

    #[must_use]
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Bounds `relation` between `lower` and `upper`, replacing any
    /// previous (possibly symbolic) bound.  Targets and weights
    /// survive rebinding.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the tuple sets do not match the relation's
    /// arity or this universe, or if `lower` is not a subset of
    /// `upper`.
    pub fn bound(
        &mut self,
        relation: &Relation,
        lower: TupleSet,
        upper: TupleSet,
    ) -> Result<(), BoundsError> {
        self.check_shape(relation, &lower)?;
        self.check_shape(relation, &upper)?;
        if !lower.is_subset(&upper) {
            return Err(BoundsError::LowerNotSubset(relation.name().into()));
        }

        let bound = Bound::Concrete { lower, upper };
        match self.relations.get_mut(relation) {
            Some(entry) => entry.bound = bound,
            None => {
                self.relations.insert(
                    relation.clone(),
                    RelationBound {
                        bound,
                        target: None,
                        weight: None,
                    },
                );
            }
        }

        Ok(())
    }

    /// Bounds `relation` to exactly `tuples`.
    ///
    /// # Errors
    ///
    /// Same as `bound`.
    pub fn bound_exactly(&mut self, relation: &Relation, tuples: TupleSet) -> Result<(), BoundsError> {
        self.bound(relation, tuples.clone(), tuples)
    }

    /// Declares a bound for `relation` that is only known
    /// symbolically, as `description`.  The bound set is unresolved
    /// until `resolve` replaces it.
    pub fn bound_symbolic(&mut self, relation: &Relation, description: &str) {
        let bound = Bound::Symbolic(description.into());
        match self.relations.get_mut(relation) {
            Some(entry) => entry.bound = bound,
            None => {
                self.relations.insert(
                    relation.clone(),
                    RelationBound {
                        bound,
                        target: None,
                        weight: None,
                    },
                );
            }
        }
    }

    /// Replaces `relation`'s bound, symbolic or not, with concrete
    /// tuple sets.
    ///
    /// # Errors
    ///
    /// Same as `bound`.
    pub fn resolve(
        &mut self,
        relation: &Relation,
        lower: TupleSet,
        upper: TupleSet,
    ) -> Result<(), BoundsError> {
        self.bound(relation, lower, upper)
    }

    /// Returns true iff every bound is concrete.
    #[must_use]
    pub fn resolved(&self) -> bool {
        self.relations
            .values()
            .all(|entry| matches!(entry.bound, Bound::Concrete { .. }))
    }

    /// Sets the preferred value for `relation`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on arity or universe mismatch, or if `relation`
    /// has no bound yet.
    pub fn set_target(&mut self, relation: &Relation, target: TupleSet) -> Result<(), BoundsError> {
        self.check_shape(relation, &target)?;
        self.entry(relation)?.target = Some(target);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Err` if `relation` has no bound yet.
    pub fn set_weight(&mut self, relation: &Relation, weight: i32) -> Result<(), BoundsError> {
        self.entry(relation)?.weight = Some(weight);
        Ok(())
    }

    /// Returns the description of `relation`'s bound, if it is still
    /// only known symbolically.
    #[must_use]
    pub fn symbolic(&self, relation: &Relation) -> Option<&str> {
        match &self.relations.get(relation)?.bound {
            Bound::Symbolic(description) => Some(description.as_str()),
            Bound::Concrete { .. } => None,
        }
    }

    /// Relations with a bound, in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> + '_ {
        self.relations.keys()
    }

    #[must_use]
    pub fn contains(&self, relation: &Relation) -> bool {
        self.relations.contains_key(relation)
    }

    /// Returns `relation`'s lower bound, or `None` if it is unbound
    /// or only known symbolically.
    #[must_use]
    pub fn lower_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        match &self.relations.get(relation)?.bound {
            Bound::Concrete { lower, .. } => Some(lower),
            Bound::Symbolic(_) => None,
        }
    }

    /// Returns `relation`'s upper bound, or `None` if it is unbound
    /// or only known symbolically.
    #[must_use]
    pub fn upper_bound(&self, relation: &Relation) -> Option<&TupleSet> {
        match &self.relations.get(relation)?.bound {
            Bound::Concrete { upper, .. } => Some(upper),
            Bound::Symbolic(_) => None,
        }
    }

    #[must_use]
    pub fn target(&self, relation: &Relation) -> Option<&TupleSet> {
        self.relations.get(relation)?.target.as_ref()
    }

    #[must_use]
    pub fn weight(&self, relation: &Relation) -> Option<i32> {
        self.relations.get(relation)?.weight
    }

    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = provenance;
    }

    #[must_use]
    pub fn amalgamated(&self) -> Option<&Bounds> {
        self.amalgamated.as_deref()
    }

    /// Attaches `amalgamated` as the companion of `self`.
    #[must_use]
    pub fn with_amalgamated(mut self, amalgamated: Bounds) -> Self {
        self.amalgamated = Some(Box::new(amalgamated));
        self
    }

    /// Returns a copy of `self`, where `other`'s bounds override ours
    /// for every relation `other` bounds.
    ///
    /// # Errors
    ///
    /// Returns `Err` when `other` lives in a different universe.
    pub fn merge(&self, other: &Bounds) -> Result<Bounds, BoundsError> {
        if !same_universe(&self.universe, &other.universe) {
            return Err(BoundsError::UniverseMismatch);
        }

        let mut ret = self.clone();
        for (relation, entry) in &other.relations {
            ret.relations.insert(relation.clone(), entry.clone());
        }

        Ok(ret)
    }

    fn entry(&mut self, relation: &Relation) -> Result<&mut RelationBound, BoundsError> {
        self.relations
            .get_mut(relation)
            .ok_or_else(|| BoundsError::Unbound(relation.name().into()))
    }

    fn check_shape(&self, relation: &Relation, tuples: &TupleSet) -> Result<(), BoundsError> {
        if tuples.arity() != relation.arity() {
            return Err(BoundsError::ArityMismatch {
                expected: relation.arity(),
                found: tuples.arity(),
            });
        }

        if !same_universe(&self.universe, tuples.universe()) {
            return Err(BoundsError::UniverseMismatch);
        }

        Ok(())
    }
}

#[cfg(test)]
fn test_universe() -> Arc<Universe> {
    Arc::new(Universe::new(crate::universe::atoms(&["a", "b", "c"])).expect("ok"))
}

#[test]
fn test_bound_checks() {
    let universe = test_universe();
    let r = Relation::unary("r");
    let mut bounds = Bounds::new(universe.clone());

    let a = TupleSet::singleton(&universe, &["a".into()]).expect("ok");
    let ab = TupleSet::range(&universe, &"a".into(), &"b".into()).expect("ok");

    bounds.bound(&r, a.clone(), ab.clone()).expect("ok");
    assert_eq!(bounds.lower_bound(&r), Some(&a));
    assert_eq!(bounds.upper_bound(&r), Some(&ab));

    // Lower must be a subset of upper.
    assert!(bounds.bound(&r, ab.clone(), a.clone()).is_err());
    // Arity must match.
    assert!(bounds
        .bound_exactly(&Relation::binary("s"), a.clone())
        .is_err());
    // Universes must match.
    let other = Arc::new(Universe::new(crate::universe::atoms(&["a"])).expect("ok"));
    let foreign = TupleSet::singleton(&other, &["a".into()]).expect("ok");
    assert!(bounds.bound_exactly(&r, foreign).is_err());
}

#[test]
fn test_symbolic_resolution() {
    let universe = test_universe();
    let r = Relation::unary("r");
    let s = Relation::unary("s");
    let mut bounds = Bounds::new(universe.clone());

    let all = TupleSet::range(&universe, &"a".into(), &"c".into()).expect("ok");
    bounds.bound_exactly(&r, all.clone()).expect("ok");
    bounds.bound_symbolic(&s, "r - a");
    bounds.set_weight(&s, 3).expect("ok");
    assert!(!bounds.resolved());
    assert!(bounds.lower_bound(&s).is_none());
    assert_eq!(bounds.symbolic(&s), Some("r - a"));
    assert_eq!(bounds.symbolic(&r), None);

    bounds
        .resolve(&s, TupleSet::none_of(&universe, 1), all)
        .expect("ok");
    assert!(bounds.resolved());
    assert_eq!(bounds.symbolic(&s), None);
    assert_eq!(bounds.weight(&s), Some(3));
    assert_eq!(bounds.relations().count(), 2);
}

#[test]
fn test_merge_prefers_other() {
    let universe = test_universe();
    let r = Relation::unary("r");
    let s = Relation::unary("s");

    let a = TupleSet::singleton(&universe, &["a".into()]).expect("ok");
    let b = TupleSet::singleton(&universe, &["b".into()]).expect("ok");

    let mut left = Bounds::new(universe.clone());
    left.bound_exactly(&r, a.clone()).expect("ok");
    left.bound_exactly(&s, a.clone()).expect("ok");

    let mut right = Bounds::new(universe.clone());
    right.bound_exactly(&s, b.clone()).expect("ok");

    let merged = left.merge(&right).expect("ok");
    assert_eq!(merged.lower_bound(&r), Some(&a));
    assert_eq!(merged.lower_bound(&s), Some(&b));
    // Merging never touches the inputs.
    assert_eq!(left.lower_bound(&s), Some(&a));
}

#[test]
fn test_preferences_need_a_bound() {
    let universe = test_universe();
    let r = Relation::unary("r");
    let mut bounds = Bounds::new(universe.clone());
    let a = TupleSet::singleton(&universe, &["a".into()]).expect("ok");

    assert!(matches!(bounds.set_weight(&r, 1), Err(BoundsError::Unbound(_))));
    assert!(matches!(
        bounds.set_target(&r, a.clone()),
        Err(BoundsError::Unbound(_))
    ));
    // Nothing was bound as a side effect.
    assert!(!bounds.contains(&r));
    assert!(bounds.lower_bound(&r).is_none());

    bounds
        .bound(&r, TupleSet::none_of(&universe, 1), a.clone())
        .expect("ok");
    bounds.set_target(&r, a.clone()).expect("ok");
    bounds.set_weight(&r, 1).expect("ok");
    assert_eq!(bounds.target(&r), Some(&a));
    assert_eq!(bounds.weight(&r), Some(1));
}
