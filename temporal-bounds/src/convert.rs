//! Re-expresses a tuple set over a different universe that shares
//! atom identities with the original.  Positions are not portable
//! across universes, so every component goes through an identity
//! lookup.
use crate::universe::same_universe;
use crate::TupleSet;
use crate::Universe;
use std::sync::Arc;

/// Returns a tuple set over `universe` with the same tuples (by atom
/// identity) as `tuples`.  Costs O(size × arity).
///
/// # Panics
///
/// Panics when one of the atoms in `tuples` does not exist in
/// `universe`.  Target universes are built as strict extensions of
/// source universes, so this is a bug, not an input error.
#[must_use]
pub fn convert(tuples: &TupleSet, universe: &Arc<Universe>) -> TupleSet {
    let source = tuples.universe();
    let mut ret = TupleSet::none_of(universe, tuples.arity());

    if same_universe(source, universe) {
        for tuple in tuples.index_tuples() {
            ret.insert_indices(tuple.to_vec());
        }

        return ret;
    }

    for tuple in tuples.index_tuples() {
        let converted = tuple
            .iter()
            .map(|&index| {
                let atom = source.atom(index);
                universe.index(atom).unwrap_or_else(|| {
                    panic!("atom {} is missing from the target universe", atom)
                })
            })
            .collect();
        ret.insert_indices(converted);
    }

    ret
}

#[test]
fn test_convert_into_extension() {
    use crate::universe::atoms;

    let base = Arc::new(Universe::new(atoms(&["a", "b", "c"])).expect("ok"));
    // Prepend-like reshuffling: the same atoms at other positions.
    let other = Arc::new(Universe::new(atoms(&["x", "c", "b", "a"])).expect("ok"));

    let set = TupleSet::from_tuples(
        &base,
        2,
        vec![atoms(&["a", "b"]), atoms(&["c", "a"])],
    )
    .expect("ok");

    let converted = convert(&set, &other);
    assert!(Arc::ptr_eq(converted.universe(), &other));
    assert_eq!(converted.len(), 2);
    assert!(converted.contains(&atoms(&["a", "b"])));
    assert!(converted.contains(&atoms(&["c", "a"])));

    // And back again.
    assert_eq!(convert(&converted, &base), set);
}

#[test]
#[should_panic(expected = "missing from the target universe")]
fn test_convert_missing_atom() {
    use crate::universe::atoms;

    let base = Arc::new(Universe::new(atoms(&["a", "b"])).expect("ok"));
    let other = Arc::new(Universe::new(atoms(&["a"])).expect("ok"));
    let set = TupleSet::singleton(&base, &atoms(&["b"])).expect("ok");

    let _ = convert(&set, &other);
}
