//! A reference `Solver` over CryptoMiniSat, for formulas already in
//! clausal form.
//!
//! A `ClauseFormula` is a conjunction of clauses, and each clause a
//! disjunction of `Literal`s that state whether a tuple belongs to a
//! relation.  `CmsSolver` builds a fresh CryptoMiniSat instance for
//! each call, so it is trivially `Send + Sync`.  Enumeration blocks
//! each model with a nogood over every free tuple, and ends with one
//! unsatisfiable solution.
mod gadgets;
mod solver_state;

use crate::Formula;
use crate::Solution;
use crate::Solver;
use solver_state::SolverState;
use temporal_bounds::Atom;
use temporal_bounds::Bounds;
use temporal_bounds::Relation;
use tracing::debug;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Literal {
    relation: Relation,
    tuple: Vec<Atom>,
    positive: bool,
}

impl Literal {
    /// `tuple` belongs to `relation`.
    #[must_use]
    pub fn holds(relation: &Relation, tuple: &[Atom]) -> Self {
        Self {
            relation: relation.clone(),
            tuple: tuple.to_vec(),
            positive: true,
        }
    }

    /// `tuple` does not belong to `relation`.
    #[must_use]
    pub fn fails(relation: &Relation, tuple: &[Atom]) -> Self {
        Self {
            positive: false,
            ..Self::holds(relation, tuple)
        }
    }

    #[must_use]
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    #[must_use]
    pub fn tuple(&self) -> &[Atom] {
        &self.tuple
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.positive
    }
}

impl std::ops::Not for Literal {
    type Output = Literal;

    fn not(mut self) -> Literal {
        self.positive = !self.positive;
        self
    }
}

/// The empty formula is trivially true.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClauseFormula {
    clauses: Vec<Vec<Literal>>,
}

impl ClauseFormula {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the disjunction of `literals`.  An empty clause makes the
    /// formula unsatisfiable.
    #[must_use]
    pub fn with_clause<I>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = Literal>,
    {
        self.clauses.push(literals.into_iter().collect());
        self
    }

    #[must_use]
    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }
}

impl Formula for ClauseFormula {
    fn and(&self, other: &Self) -> Self {
        let mut clauses = self.clauses.clone();
        clauses.extend(other.clauses.iter().cloned());
        Self { clauses }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CmsSolver {}

impl CmsSolver {
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

impl Solver for CmsSolver {
    type Formula = ClauseFormula;

    fn solve(&self, formula: &ClauseFormula, bounds: &Bounds) -> Solution {
        let mut state = SolverState::new(formula, bounds);
        debug!(vars = state.num_vars(), "solving");
        match state.solve() {
            Some(instance) => Solution::satisfiable(instance),
            None => Solution::unsatisfiable(),
        }
    }

    fn solve_all<'a>(
        &'a self,
        formula: &ClauseFormula,
        bounds: &Bounds,
    ) -> Box<dyn Iterator<Item = Solution> + 'a> {
        Box::new(Enumeration {
            state: Some(SolverState::new(formula, bounds)),
        })
    }
}

struct Enumeration {
    // `None` once the final unsatisfiable solution is out.
    state: Option<SolverState>,
}

impl Iterator for Enumeration {
    type Item = Solution;

    fn next(&mut self) -> Option<Solution> {
        let state = self.state.as_mut()?;
        match state.solve() {
            Some(instance) => {
                state.block_model();
                Some(Solution::satisfiable(instance))
            }
            None => {
                self.state = None;
                Some(Solution::unsatisfiable())
            }
        }
    }
}

#[cfg(test)]
fn abc() -> (std::sync::Arc<temporal_bounds::Universe>, Relation) {
    use std::sync::Arc;
    use temporal_bounds::Universe;

    let universe = Arc::new(
        Universe::new(vec![Atom::new("a"), "b".into(), "c".into()]).expect("ok"),
    );
    (universe, Relation::unary("r"))
}

#[test]
fn test_solve_within_bounds() {
    use temporal_bounds::TupleSet;

    let (universe, r) = abc();
    let mut bounds = Bounds::new(universe.clone());
    bounds
        .bound(
            &r,
            TupleSet::singleton(&universe, &["a".into()]).expect("ok"),
            TupleSet::range(&universe, &"a".into(), &"b".into()).expect("ok"),
        )
        .expect("ok");

    let formula = ClauseFormula::new().with_clause(vec![Literal::fails(&r, &["b".into()])]);
    let solution = CmsSolver::new().solve(&formula, &bounds);
    assert!(solution.sat());

    let tuples = solution
        .instance()
        .and_then(|instance| instance.tuples(&r))
        .expect("r");
    assert_eq!(tuples.len(), 1);
    assert!(tuples.contains(&["a".into()]));

    // `c` is outside the upper bound, and `a` is in the lower bound.
    let formula = formula
        .with_clause(vec![Literal::holds(&r, &["c".into()])])
        .and(&ClauseFormula::new().with_clause(vec![!Literal::holds(&r, &["a".into()])]));
    assert!(!CmsSolver::new().solve(&formula, &bounds).sat());
}

#[test]
fn test_enumerate_models() {
    use temporal_bounds::TupleSet;

    let (universe, r) = abc();
    let mut bounds = Bounds::new(universe.clone());
    bounds
        .bound(
            &r,
            TupleSet::none_of(&universe, 1),
            TupleSet::range(&universe, &"a".into(), &"c".into()).expect("ok"),
        )
        .expect("ok");

    // Any subset of {a, b, c} with a or b.
    let formula = ClauseFormula::new().with_clause(vec![
        Literal::holds(&r, &["a".into()]),
        Literal::holds(&r, &["b".into()]),
    ]);
    let solver = CmsSolver::new();
    let solutions: Vec<Solution> = solver.solve_all(&formula, &bounds).collect();

    assert_eq!(solutions.len(), 7);
    assert!(solutions[..6].iter().all(Solution::sat));
    assert!(!solutions[6].sat());
}

#[test]
fn test_enumerate_fixed_problem() {
    use temporal_bounds::TupleSet;

    // Nothing is free: exactly one model.
    let (universe, r) = abc();
    let mut bounds = Bounds::new(universe.clone());
    bounds
        .bound_exactly(
            &r,
            TupleSet::singleton(&universe, &["b".into()]).expect("ok"),
        )
        .expect("ok");

    let solver = CmsSolver::new();
    let outcomes: Vec<bool> = solver
        .solve_all(&ClauseFormula::new(), &bounds)
        .map(|solution| solution.sat())
        .collect();
    assert_eq!(outcomes, [true, false]);

    let contradiction = ClauseFormula::new().with_clause(Vec::new());
    let outcomes: Vec<bool> = solver
        .solve_all(&contradiction, &bounds)
        .map(|solution| solution.sat())
        .collect();
    assert_eq!(outcomes, [false]);
}
