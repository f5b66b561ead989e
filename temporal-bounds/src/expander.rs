//! The expander turns bounds over variable relations into plain
//! bounds over an explicitly unrolled trace.
//!
//! We first extend the universe with synthetic state atoms (and, in
//! the single-unroll encoding, unroll-level atoms), then bind the
//! trace relations in `TraceRelations` to describe every admissible
//! lasso, and finally lift each variable relation's bounds to its
//! expanded relation by appending a state column.  Static relations
//! keep their bounds, re-expressed over the new universe.
//!
//! Variable relations are only pinned over the first unroll: their
//! values in later unrolls are left to the solver, which ties them
//! back to the first unroll through `prefix` and `unroll_map`.
//!
//! Expansion is a pure function of the input bounds (with their
//! provenance) and `TraceParams`.
use crate::convert;
use crate::trace::LEVEL_ATOM;
use crate::trace::STATE_ATOM;
use crate::trace::STATE_SEP;
use crate::Atom;
use crate::Bounds;
use crate::BoundsError;
use crate::TraceEncoding;
use crate::TraceParams;
use crate::TraceRelations;
use crate::TupleSet;
use crate::Universe;
use std::sync::Arc;
use tracing::debug;

/// The result of `expand`: time-free bounds over the extended
/// universe, and the synthetic atoms we appended to it, in order.
#[derive(Clone, Debug)]
pub struct Expansion {
    pub bounds: Bounds,
    pub trace_atoms: Vec<Atom>,
}

/// Expands `bounds` into a static encoding of traces shaped by
/// `params`.  A companion bound set, if any, is expanded over the
/// same universe and attached to the result.
///
/// # Errors
///
/// Returns `Err` if `bounds` (or its companion) is not resolved, if
/// `params` is invalid, or if the original universe already contains
/// atoms named like trace atoms.
pub fn expand(bounds: &Bounds, params: &TraceParams) -> Result<Expansion, BoundsError> {
    params.validate()?;
    if !bounds.resolved() {
        return Err(BoundsError::Unresolved);
    }

    let (universe, trace_atoms) = expand_universe(bounds.universe(), params)?;
    debug!(
        states = params.states,
        unrolls = params.unrolls,
        force_loop = params.force_loop,
        encoding = ?params.encoding,
        atoms = universe.size(),
        "expanding temporal bounds"
    );

    let bounds = expand_over(bounds, &universe, params)?;
    Ok(Expansion {
        bounds,
        trace_atoms,
    })
}

/// Returns a copy of `universe` extended with the trace atoms for
/// `params`, along with the list of these trace atoms.
///
/// # Errors
///
/// Returns `Err` when a trace atom already exists in `universe`.
pub fn expand_universe(
    universe: &Universe,
    params: &TraceParams,
) -> Result<(Arc<Universe>, Vec<Atom>), BoundsError> {
    let mut trace_atoms = Vec::new();

    match params.encoding {
        TraceEncoding::SingleUnroll => {
            trace_atoms.extend((0..=params.states).map(state_atom));
            trace_atoms.extend((0..params.unrolls).map(level_atom));
        }
        TraceEncoding::MultiUnroll => {
            for j in 0..params.unrolls {
                trace_atoms.extend((0..params.states).map(|i| unrolled_state_atom(i, j)));
            }
        }
    }

    let extended = universe.extend(trace_atoms.iter().cloned())?;
    Ok((Arc::new(extended), trace_atoms))
}

fn expand_over(
    bounds: &Bounds,
    universe: &Arc<Universe>,
    params: &TraceParams,
) -> Result<Bounds, BoundsError> {
    if !bounds.resolved() {
        return Err(BoundsError::Unresolved);
    }

    let mut ret = Bounds::new(universe.clone());
    let first_unroll = match params.encoding {
        TraceEncoding::SingleUnroll => bind_single_unroll(&mut ret, params)?,
        TraceEncoding::MultiUnroll => bind_multi_unroll(&mut ret, params)?,
    };

    for relation in bounds.relations() {
        let (lower, upper) = match (bounds.lower_bound(relation), bounds.upper_bound(relation)) {
            (Some(lower), Some(upper)) => (convert(lower, universe), convert(upper, universe)),
            _ => return Err(BoundsError::Unresolved),
        };
        let target = bounds.target(relation).map(|x| convert(x, universe));

        match relation.expanded() {
            Some(expanded) => {
                ret.bound(
                    expanded,
                    lower.product(&first_unroll)?,
                    upper.product(&first_unroll)?,
                )?;
                if let Some(target) = target {
                    ret.set_target(expanded, target.product(&first_unroll)?)?;
                }
                if let Some(weight) = bounds.weight(relation) {
                    ret.set_weight(expanded, weight)?;
                }
            }
            None => {
                ret.bound(relation, lower, upper)?;
                if let Some(target) = target {
                    ret.set_target(relation, target)?;
                }
                if let Some(weight) = bounds.weight(relation) {
                    ret.set_weight(relation, weight)?;
                }
            }
        }
    }

    ret.set_provenance(bounds.provenance());
    if let Some(amalgamated) = bounds.amalgamated() {
        let companion = expand_over(amalgamated, universe, params)?;
        ret = ret.with_amalgamated(companion);
    }

    Ok(ret)
}

/// Binds the trace relations for a single `states + 1` long chain,
/// plus an independent chain of `unrolls` levels.  Returns the set of
/// states over which variable relations are pinned.
fn bind_single_unroll(bounds: &mut Bounds, params: &TraceParams) -> Result<TupleSet, BoundsError> {
    let trace = TraceRelations::get();
    let universe = bounds.universe().clone();
    let states = params.states;
    let unrolls = params.unrolls;

    bounds.bound_exactly(&trace.first, TupleSet::singleton(&universe, &[state_atom(0)])?)?;
    bounds.bound_exactly(
        &trace.last,
        TupleSet::singleton(&universe, &[state_atom(states)])?,
    )?;

    let all_states = TupleSet::range(&universe, &state_atom(0), &state_atom(states))?;
    bounds.bound_exactly(&trace.state, all_states.clone())?;

    let mut prefix = TupleSet::none_of(&universe, 2);
    for i in 0..states {
        prefix.add(&[state_atom(i), state_atom(i + 1)])?;
    }
    bounds.bound_exactly(&trace.prefix, prefix)?;

    bounds.bound_exactly(&trace.l_first, TupleSet::singleton(&universe, &[level_atom(0)])?)?;
    bounds.bound_exactly(
        &trace.l_last,
        TupleSet::singleton(&universe, &[level_atom(unrolls - 1)])?,
    )?;
    bounds.bound_exactly(
        &trace.level,
        TupleSet::range(&universe, &level_atom(0), &level_atom(unrolls - 1))?,
    )?;

    let mut level_prefix = TupleSet::none_of(&universe, 2);
    for i in 0..unrolls - 1 {
        level_prefix.add(&[level_atom(i), level_atom(i + 1)])?;
    }
    bounds.bound_exactly(&trace.l_prefix, level_prefix)?;

    // The solver picks the loop target among every state but the
    // first.
    bounds.bound(
        &trace.loop_,
        TupleSet::none_of(&universe, 1),
        TupleSet::range(&universe, &state_atom(1), &state_atom(states))?,
    )?;

    Ok(all_states)
}

/// Binds the trace relations for `unrolls` copies of a `states` long
/// chain.  Returns the set of states over which variable relations
/// are pinned: the first unroll, plus the last state of every unroll
/// when the trace must loop.
fn bind_multi_unroll(bounds: &mut Bounds, params: &TraceParams) -> Result<TupleSet, BoundsError> {
    let trace = TraceRelations::get();
    let universe = bounds.universe().clone();
    let states = params.states;
    let unrolls = params.unrolls;
    let last_state = states - 1;
    let last_unroll = unrolls - 1;

    bounds.bound_exactly(
        &trace.first,
        TupleSet::singleton(&universe, &[unrolled_state_atom(0, 0)])?,
    )?;

    let last_lower = TupleSet::singleton(&universe, &[unrolled_state_atom(last_state, last_unroll)])?;
    let mut last_upper = last_lower.clone();
    if !params.force_loop {
        // A trace that does not loop may stop after the first unroll.
        last_upper.add(&[unrolled_state_atom(last_state, 0)])?;
    }
    bounds.bound(&trace.last, last_lower, last_upper)?;
    bounds.bound_exactly(
        &trace.last_,
        TupleSet::singleton(&universe, &[unrolled_state_atom(last_state, 0)])?,
    )?;

    let all_states = TupleSet::range(
        &universe,
        &unrolled_state_atom(0, 0),
        &unrolled_state_atom(last_state, last_unroll),
    )?;
    let mut first_unroll = TupleSet::range(
        &universe,
        &unrolled_state_atom(0, 0),
        &unrolled_state_atom(last_state, 0),
    )?;
    if params.force_loop {
        // The last state then exists in every unroll.
        for j in 0..unrolls {
            first_unroll.add(&[unrolled_state_atom(last_state, j)])?;
        }
    }
    bounds.bound(&trace.state, first_unroll.clone(), all_states)?;

    bounds.bound(
        &trace.loop_,
        TupleSet::none_of(&universe, 1),
        TupleSet::range(
            &universe,
            &unrolled_state_atom(0, last_unroll),
            &unrolled_state_atom(last_state, last_unroll),
        )?,
    )?;

    let mut prefix_lower = TupleSet::none_of(&universe, 2);
    for i in 0..last_state {
        prefix_lower.add(&[unrolled_state_atom(i, 0), unrolled_state_atom(i + 1, 0)])?;
    }

    let mut prefix_upper = TupleSet::none_of(&universe, 2);
    for j in 0..unrolls {
        for i in 0..last_state {
            prefix_upper.add(&[unrolled_state_atom(i, j), unrolled_state_atom(i + 1, j)])?;
        }

        if j < last_unroll {
            // Every state of the next unroll is a possible loop
            // re-entry point.
            for k in 0..states {
                prefix_upper.add(&[
                    unrolled_state_atom(last_state, j),
                    unrolled_state_atom(k, j + 1),
                ])?;
            }
        }
    }
    bounds.bound(&trace.prefix, prefix_lower, prefix_upper)?;

    if unrolls > 1 {
        let mut unroll_map = TupleSet::none_of(&universe, 2);
        for i in 0..states {
            for j in 0..unrolls {
                unroll_map.add(&[unrolled_state_atom(i, j), unrolled_state_atom(i, 0)])?;
            }
        }
        bounds.bound_exactly(&trace.unroll_map, unroll_map)?;
    }

    Ok(first_unroll)
}

fn state_atom(i: usize) -> Atom {
    Atom::from(format!("{}{}", STATE_ATOM, i))
}

fn unrolled_state_atom(i: usize, j: usize) -> Atom {
    Atom::from(format!("{}{}{}{}", STATE_ATOM, i, STATE_SEP, j))
}

fn level_atom(j: usize) -> Atom {
    Atom::from(format!("{}{}", LEVEL_ATOM, j))
}

#[cfg(test)]
mod fixtures {
    use crate::universe::atoms;
    use crate::Bounds;
    use crate::Relation;
    use crate::TupleSet;
    use crate::Universe;
    use std::sync::Arc;

    /// One static relation `r` bound to `{a}` and one variable
    /// relation `v` bound to `{a, b}`, over `{a, b}`.
    pub struct Fixture {
        pub r: Relation,
        pub v: Relation,
        pub bounds: Bounds,
    }

    pub fn fixture() -> Fixture {
        let universe = Arc::new(Universe::new(atoms(&["a", "b"])).expect("ok"));
        let r = Relation::unary("R");
        let v = Relation::variable("V", 1);

        let mut bounds = Bounds::new(universe.clone());
        bounds
            .bound_exactly(&r, TupleSet::singleton(&universe, &atoms(&["a"])).expect("ok"))
            .expect("ok");
        bounds
            .bound_exactly(
                &v,
                TupleSet::range(&universe, &"a".into(), &"b".into()).expect("ok"),
            )
            .expect("ok");

        Fixture { r, v, bounds }
    }
}

#[cfg(test)]
fn follows_chain(bounds: &Bounds) -> Vec<Vec<Atom>> {
    // Walks `prefix` (upper bound) from `first`, returning the layers
    // of states reachable in 0, 1, 2, ... steps.
    use std::collections::BTreeSet;

    let trace = TraceRelations::get();
    let prefix: Vec<Vec<Atom>> = bounds
        .upper_bound(&trace.prefix)
        .expect("prefix")
        .iter()
        .collect();
    let mut frontier: BTreeSet<Atom> = bounds
        .lower_bound(&trace.first)
        .expect("first")
        .iter()
        .map(|x| x[0].clone())
        .collect();
    let mut seen = frontier.clone();
    let mut layers = vec![frontier.iter().cloned().collect::<Vec<_>>()];

    loop {
        let next: BTreeSet<Atom> = prefix
            .iter()
            .filter(|edge| frontier.contains(&edge[0]) && !seen.contains(&edge[1]))
            .map(|edge| edge[1].clone())
            .collect();
        if next.is_empty() {
            return layers;
        }

        seen.extend(next.iter().cloned());
        layers.push(next.iter().cloned().collect());
        frontier = next;
    }
}

#[test]
fn test_single_unroll_scenario() {
    let fixture = fixtures::fixture();
    let params = TraceParams::new(3, 1, false, TraceEncoding::SingleUnroll);
    let expansion = expand(&fixture.bounds, &params).expect("ok");
    let expanded = &expansion.bounds;
    let trace = TraceRelations::get();

    // a, b, four states and one level.
    assert_eq!(expansion.trace_atoms.len(), 5);
    assert_eq!(expanded.universe().size(), 7);
    assert_eq!(expanded.upper_bound(&trace.state).expect("state").len(), 4);

    // Static relations keep their bound.
    let r_bound = expanded.lower_bound(&fixture.r).expect("R");
    assert_eq!(r_bound.len(), 1);
    assert!(r_bound.contains(&[Atom::new("a")]));
    assert_eq!(expanded.upper_bound(&fixture.r), Some(r_bound));

    // Variable relations only show up through their expansion, as
    // {a, b} x states.
    assert!(!expanded.contains(&fixture.v));
    let v_bound = expanded
        .lower_bound(fixture.v.expanded().expect("variable"))
        .expect("V");
    assert_eq!(v_bound.arity(), 2);
    assert_eq!(v_bound.len(), 2 * 4);
    assert!(v_bound.contains(&[Atom::new("b"), state_atom(0)]));
}

#[test]
fn test_single_unroll_trace_shape() {
    let fixture = fixtures::fixture();
    let params = TraceParams::new(3, 2, false, TraceEncoding::SingleUnroll);
    let expanded = expand(&fixture.bounds, &params).expect("ok").bounds;
    let trace = TraceRelations::get();

    assert_eq!(
        expanded.lower_bound(&trace.first),
        expanded.upper_bound(&trace.first)
    );
    assert!(expanded
        .lower_bound(&trace.last)
        .expect("last")
        .contains(&[state_atom(3)]));

    let prefix = expanded.lower_bound(&trace.prefix).expect("prefix");
    assert_eq!(prefix.len(), 3);
    assert_eq!(expanded.upper_bound(&trace.prefix), Some(prefix));

    let loop_ = &trace.loop_;
    assert!(expanded.lower_bound(loop_).expect("loop").is_empty());
    let loop_upper = expanded.upper_bound(loop_).expect("loop");
    assert_eq!(loop_upper.len(), 3);
    assert!(!loop_upper.contains(&[state_atom(0)]));

    assert_eq!(expanded.lower_bound(&trace.level).expect("level").len(), 2);
    assert_eq!(expanded.lower_bound(&trace.l_prefix).expect("l_prefix").len(), 1);
    assert!(expanded
        .lower_bound(&trace.l_last)
        .expect("l_last")
        .contains(&[level_atom(1)]));
    assert!(!expanded.contains(&trace.unroll_map));

    // One chain from first to last.
    let layers = follows_chain(&expanded);
    assert_eq!(layers.len(), 4);
    assert_eq!(layers.last().expect("layer"), &vec![state_atom(3)]);
}

#[test]
fn test_multi_unroll_shape() {
    let fixture = fixtures::fixture();
    let params = TraceParams::new(3, 2, false, TraceEncoding::MultiUnroll);
    let expansion = expand(&fixture.bounds, &params).expect("ok");
    let expanded = &expansion.bounds;
    let trace = TraceRelations::get();

    assert_eq!(expansion.trace_atoms.len(), 6);
    assert_eq!(expanded.upper_bound(&trace.state).expect("state").len(), 6);
    assert_eq!(expanded.lower_bound(&trace.state).expect("state").len(), 3);

    let last_upper = expanded.upper_bound(&trace.last).expect("last");
    assert!(last_upper.contains(&[unrolled_state_atom(2, 1)]));
    assert!(last_upper.contains(&[unrolled_state_atom(2, 0)]));
    assert!(expanded
        .lower_bound(&trace.last)
        .expect("last")
        .contains(&[unrolled_state_atom(2, 1)]));

    // Two chains of two edges, plus three re-entry edges.
    let prefix_upper = expanded.upper_bound(&trace.prefix).expect("prefix");
    assert_eq!(prefix_upper.len(), 2 * 2 + 3);
    for k in 0..3 {
        assert!(prefix_upper.contains(&[unrolled_state_atom(2, 0), unrolled_state_atom(k, 1)]));
    }
    assert_eq!(expanded.lower_bound(&trace.prefix).expect("prefix").len(), 2);

    // Loop targets live in the final unroll.
    let loop_upper = expanded.upper_bound(&trace.loop_).expect("loop");
    assert_eq!(loop_upper.len(), 3);
    assert!(loop_upper.iter().all(|x| x[0].label().ends_with("_1")));

    let unroll_map = expanded.lower_bound(&trace.unroll_map).expect("unroll_map");
    assert_eq!(unroll_map.len(), 6);
    assert!(unroll_map.contains(&[unrolled_state_atom(1, 1), unrolled_state_atom(1, 0)]));
    assert!(unroll_map.contains(&[unrolled_state_atom(1, 0), unrolled_state_atom(1, 0)]));

    // Variable relations are pinned over the first unroll only.
    let v_upper = expanded
        .upper_bound(fixture.v.expanded().expect("variable"))
        .expect("V");
    assert_eq!(v_upper.len(), 2 * 3);
    assert!(!v_upper.contains(&[Atom::new("a"), unrolled_state_atom(0, 1)]));

    // Every last candidate is reachable from first.
    let reachable: Vec<Atom> = follows_chain(expanded).into_iter().flatten().collect();
    for candidate in last_upper.iter() {
        assert!(reachable.contains(&candidate[0]));
    }
}

#[test]
fn test_multi_unroll_force_loop() {
    let fixture = fixtures::fixture();
    let params = TraceParams::new(3, 2, true, TraceEncoding::MultiUnroll);
    let expanded = expand(&fixture.bounds, &params).expect("ok").bounds;
    let trace = TraceRelations::get();

    let last_upper = expanded.upper_bound(&trace.last).expect("last");
    assert!(!last_upper.contains(&[unrolled_state_atom(2, 0)]));
    assert_eq!(last_upper.len(), 1);

    // The last state exists in every unroll.
    let state_lower = expanded.lower_bound(&trace.state).expect("state");
    assert_eq!(state_lower.len(), 4);
    assert!(state_lower.contains(&[unrolled_state_atom(2, 1)]));
}

#[test]
fn test_multi_unroll_single_copy() {
    let fixture = fixtures::fixture();
    let params = TraceParams::new(2, 1, false, TraceEncoding::MultiUnroll);
    let expanded = expand(&fixture.bounds, &params).expect("ok").bounds;
    let trace = TraceRelations::get();

    assert!(!expanded.contains(&trace.unroll_map));
    assert_eq!(expanded.upper_bound(&trace.state).expect("state").len(), 2);
    // With one unroll, both last candidates coincide.
    assert_eq!(expanded.upper_bound(&trace.last).expect("last").len(), 1);
}

#[test]
fn test_targets_weights_and_provenance() {
    use crate::Provenance;

    let mut fixture = fixtures::fixture();
    let universe = fixture.bounds.universe().clone();
    let b = TupleSet::singleton(&universe, &[Atom::new("b")]).expect("ok");
    let a = TupleSet::singleton(&universe, &[Atom::new("a")]).expect("ok");

    fixture.bounds.set_target(&fixture.v, b).expect("ok");
    fixture.bounds.set_weight(&fixture.v, 7).expect("ok");
    fixture.bounds.set_target(&fixture.r, a).expect("ok");
    fixture.bounds.set_weight(&fixture.r, 2).expect("ok");
    let provenance = Provenance {
        trivial_config: true,
        integrated: false,
        integration: true,
    };
    fixture.bounds.set_provenance(provenance);

    let params = TraceParams::new(2, 1, false, TraceEncoding::SingleUnroll);
    let expanded = expand(&fixture.bounds, &params).expect("ok").bounds;
    let v = fixture.v.expanded().expect("variable");

    assert_eq!(expanded.weight(v), Some(7));
    assert_eq!(expanded.target(v).expect("target").len(), 3);
    assert_eq!(expanded.weight(&fixture.r), Some(2));
    assert_eq!(expanded.target(&fixture.r).expect("target").len(), 1);
    assert_eq!(expanded.provenance(), provenance);
}

#[test]
fn test_amalgamated_shares_universe() {
    let fixture = fixtures::fixture();
    let companion = fixtures::fixture();
    let bounds = fixture.bounds.clone().with_amalgamated(companion.bounds);

    let params = TraceParams::new(2, 2, false, TraceEncoding::MultiUnroll);
    let expanded = expand(&bounds, &params).expect("ok").bounds;
    let amalgamated = expanded.amalgamated().expect("companion");

    assert!(Arc::ptr_eq(expanded.universe(), amalgamated.universe()));
    assert!(amalgamated.contains(companion.v.expanded().expect("variable")));
    assert!(amalgamated.contains(&TraceRelations::get().unroll_map));
    assert!(amalgamated.amalgamated().is_none());
}

#[test]
fn test_rejects_bad_input() {
    let mut fixture = fixtures::fixture();
    let params = TraceParams::new(2, 1, false, TraceEncoding::SingleUnroll);

    assert!(matches!(
        expand(&fixture.bounds, &TraceParams::new(0, 1, false, TraceEncoding::SingleUnroll)),
        Err(BoundsError::InvalidTraceParameter { name: "states", .. })
    ));
    assert!(matches!(
        expand(&fixture.bounds, &TraceParams::new(1, 0, false, TraceEncoding::MultiUnroll)),
        Err(BoundsError::InvalidTraceParameter { name: "unrolls", .. })
    ));

    fixture.bounds.bound_symbolic(&fixture.r, "some expression");
    assert!(matches!(
        expand(&fixture.bounds, &params),
        Err(BoundsError::Unresolved)
    ));
}

#[test]
fn test_unresolved_companion() {
    let fixture = fixtures::fixture();
    let mut companion = fixtures::fixture();
    companion.bounds.bound_symbolic(&companion.r, "later");
    let bounds = fixture.bounds.with_amalgamated(companion.bounds);

    let params = TraceParams::new(2, 1, false, TraceEncoding::SingleUnroll);
    assert!(matches!(expand(&bounds, &params), Err(BoundsError::Unresolved)));
}

#[test]
fn test_input_untouched() {
    let fixture = fixtures::fixture();
    let before = fixture.bounds.universe().size();
    let params = TraceParams::new(3, 3, false, TraceEncoding::MultiUnroll);
    let _ = expand(&fixture.bounds, &params).expect("ok");

    assert_eq!(fixture.bounds.universe().size(), before);
    assert!(fixture.bounds.contains(&fixture.v));
    assert_eq!(fixture.bounds.relations().count(), 2);
}
