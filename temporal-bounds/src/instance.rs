//! An `Instance` is a concrete value for each of a set of relations:
//! what a solver hands back for a satisfiable problem.
use crate::universe::same_universe;
use crate::BoundsError;
use crate::Relation;
use crate::TupleSet;
use crate::Universe;
use indexmap::IndexMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Instance {
    universe: Arc<Universe>,
    tuples: IndexMap<Relation, TupleSet>,
}

impl Instance {
    #[must_use]
    pub fn new(universe: Arc<Universe>) -> Self {
        Self {
            universe,
            tuples: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn universe(&self) -> &Arc<Universe> {
        &self.universe
    }

    /// Sets `relation`'s value to `tuples`.
    ///
    /// # Errors
    ///
    /// Returns `Err` on arity or universe mismatch.
    pub fn add(&mut self, relation: &Relation, tuples: TupleSet) -> Result<(), BoundsError> {
        if tuples.arity() != relation.arity() {
            return Err(BoundsError::ArityMismatch {
                expected: relation.arity(),
                found: tuples.arity(),
            });
        }

        if !same_universe(&self.universe, tuples.universe()) {
            return Err(BoundsError::UniverseMismatch);
        }

        self.tuples.insert(relation.clone(), tuples);
        Ok(())
    }

    #[must_use]
    pub fn tuples(&self, relation: &Relation) -> Option<&TupleSet> {
        self.tuples.get(relation)
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> + '_ {
        self.tuples.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Relation, &TupleSet)> + '_ {
        self.tuples.iter()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        same_universe(&self.universe, &other.universe)
            && self.tuples.len() == other.tuples.len()
            && self
                .tuples
                .iter()
                .all(|(relation, tuples)| other.tuples.get(relation) == Some(tuples))
    }
}

impl Eq for Instance {}

#[test]
fn test_instance_add() {
    let universe = Arc::new(Universe::new(crate::universe::atoms(&["a", "b"])).expect("ok"));
    let r = Relation::unary("r");
    let mut instance = Instance::new(universe.clone());

    let a = TupleSet::singleton(&universe, &["a".into()]).expect("ok");
    instance.add(&r, a.clone()).expect("ok");
    assert_eq!(instance.tuples(&r), Some(&a));
    assert!(instance.add(&Relation::binary("s"), a).is_err());
    assert_eq!(instance.relations().count(), 1);
}
