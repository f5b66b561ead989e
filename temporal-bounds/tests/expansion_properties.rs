use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use temporal_bounds::convert;
use temporal_bounds::expand;
use temporal_bounds::expand_universe;
use temporal_bounds::Atom;
use temporal_bounds::Bounds;
use temporal_bounds::Relation;
use temporal_bounds::TraceEncoding;
use temporal_bounds::TraceParams;
use temporal_bounds::TraceRelations;
use temporal_bounds::TupleSet;
use temporal_bounds::Universe;

fn universe(size: usize) -> Arc<Universe> {
    Arc::new(Universe::new((0..size).map(|i| Atom::from(format!("atom{}", i)))).expect("ok"))
}

/// Builds a binary tuple set over `universe` from index pairs.
fn binary_set(universe: &Arc<Universe>, pairs: &[(usize, usize)]) -> TupleSet {
    let size = universe.size();
    TupleSet::from_tuples(
        universe,
        2,
        pairs.iter().map(|&(x, y)| {
            vec![
                universe.atom(x % size).clone(),
                universe.atom(y % size).clone(),
            ]
        }),
    )
    .expect("ok")
}

fn encoding() -> impl Strategy<Value = TraceEncoding> {
    prop_oneof![
        Just(TraceEncoding::SingleUnroll),
        Just(TraceEncoding::MultiUnroll)
    ]
}

/// Returns every state reachable from `first` through `prefix`'s
/// upper bound.
fn reachable(bounds: &Bounds) -> BTreeSet<Atom> {
    let trace = TraceRelations::get();
    let edges: Vec<Vec<Atom>> = bounds
        .upper_bound(&trace.prefix)
        .expect("prefix")
        .iter()
        .collect();
    let mut seen: BTreeSet<Atom> = bounds
        .lower_bound(&trace.first)
        .expect("first")
        .iter()
        .map(|x| x[0].clone())
        .collect();

    loop {
        let before = seen.len();
        for edge in &edges {
            if seen.contains(&edge[0]) {
                seen.insert(edge[1].clone());
            }
        }

        if seen.len() == before {
            return seen;
        }
    }
}

proptest! {
    #[test]
    fn state_count_matches_encoding(
        size in 1usize..5,
        pairs in proptest::collection::vec((0usize..8, 0usize..8), 0..6),
        states in 1usize..6,
        unrolls in 1usize..4,
        force_loop in any::<bool>(),
        encoding in encoding(),
    ) {
        let universe = universe(size);
        let r = Relation::binary("r");
        let v = Relation::variable("v", 2);
        let set = binary_set(&universe, &pairs);

        let mut bounds = Bounds::new(universe.clone());
        bounds.bound(&r, TupleSet::none_of(&universe, 2), set.clone()).expect("ok");
        bounds.bound_exactly(&v, set.clone()).expect("ok");

        let params = TraceParams::new(states, unrolls, force_loop, encoding);
        let expansion = expand(&bounds, &params).expect("ok");
        let expanded = &expansion.bounds;
        let trace = TraceRelations::get();

        let state_upper = expanded.upper_bound(&trace.state).expect("state");
        let expected = match encoding {
            TraceEncoding::SingleUnroll => states + 1,
            TraceEncoding::MultiUnroll => states * unrolls,
        };
        prop_assert_eq!(state_upper.len(), expected);
        prop_assert_eq!(
            expanded.universe().size(),
            size + expansion.trace_atoms.len()
        );

        // Every last candidate is reachable from first through prefix.
        let seen = reachable(expanded);
        for last in expanded.upper_bound(&trace.last).expect("last").iter() {
            prop_assert!(seen.contains(&last[0]));
        }

        // Static relations keep their tuples; variable relations gain
        // a state column over the pinned states.
        prop_assert_eq!(expanded.upper_bound(&r).expect("r").len(), set.len());
        let pinned = expanded.lower_bound(&trace.state).expect("state").len();
        let v_bound = expanded.lower_bound(v.expanded().expect("variable")).expect("v");
        prop_assert_eq!(v_bound.len(), set.len() * pinned);

        let unroll_map = expanded.contains(&trace.unroll_map);
        prop_assert_eq!(
            unroll_map,
            encoding == TraceEncoding::MultiUnroll && unrolls > 1
        );
    }

    #[test]
    fn convert_round_trips(
        size in 1usize..6,
        pairs in proptest::collection::vec((0usize..8, 0usize..8), 0..10),
        states in 1usize..4,
        unrolls in 1usize..3,
        encoding in encoding(),
    ) {
        let original = universe(size);
        let set = binary_set(&original, &pairs);
        let params = TraceParams::new(states, unrolls, false, encoding);
        let (extended, _) = expand_universe(&original, &params).expect("ok");

        let there = convert(&set, &extended);
        prop_assert_eq!(there.len(), set.len());
        prop_assert_eq!(convert(&there, &original), set);
    }
}
