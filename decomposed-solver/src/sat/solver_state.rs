//! A `SolverState` encodes one relational problem in CryptoMiniSat.
//!
//! Only tuples in `upper \ lower` get a variable: lower-bound tuples
//! are always present, and tuples outside the upper bound never are,
//! so literals over those simplify away before they reach the
//! solver.  Models map back to `Instance`s over the bounds' universe.
use super::gadgets;
use super::ClauseFormula;
use cryptominisat::Lbool;
use cryptominisat::Lit;
use cryptominisat::Solver;
use std::collections::HashMap;
use std::sync::Arc;
use temporal_bounds::Atom;
use temporal_bounds::Bounds;
use temporal_bounds::Instance;
use temporal_bounds::Relation;
use temporal_bounds::TupleSet;
use temporal_bounds::Universe;
use tracing::warn;

type Key = (Relation, Vec<Atom>);

/// What a literal amounts to once bounds are taken into account.
enum Value {
    Constant(bool),
    Var(Lit),
}

pub struct SolverState {
    universe: Arc<Universe>,
    solver: Solver,
    // One entry per variable, in allocation order.
    vars: Vec<Lit>,
    meaning: Vec<Key>,
    to_var: HashMap<Key, Lit>,
    lower: Vec<(Relation, TupleSet)>,
    // Set once a clause simplifies to false, or enumeration ran out
    // of variables to block.
    contradiction: bool,
}

impl SolverState {
    pub fn new(formula: &ClauseFormula, bounds: &Bounds) -> Self {
        let mut ret = Self {
            universe: bounds.universe().clone(),
            solver: Solver::new(),
            vars: Vec::new(),
            meaning: Vec::new(),
            to_var: HashMap::new(),
            lower: Vec::new(),
            contradiction: false,
        };

        for relation in bounds.relations() {
            let lower = bounds.lower_bound(relation);
            let upper = bounds.upper_bound(relation);
            let (lower, upper) = match (lower, upper) {
                (Some(lower), Some(upper)) => (lower, upper),
                _ => {
                    warn!(%relation, "ignoring unresolved relation");
                    continue;
                }
            };

            for tuple in upper.iter().filter(|tuple| !lower.contains(tuple)) {
                ret.new_var((relation.clone(), tuple));
            }

            ret.lower.push((relation.clone(), lower.clone()));
        }

        for clause in formula.clauses() {
            let mut lits = Vec::with_capacity(clause.len());
            let mut satisfied = false;
            for literal in clause {
                let key = (literal.relation().clone(), literal.tuple().to_vec());
                let value = match ret.to_var.get(&key) {
                    Some(var) => Value::Var(*var),
                    // Lower-bound tuples are always there, everything
                    // else never is.
                    None => {
                        Value::Constant(ret.in_lower_bound(literal.relation(), literal.tuple()))
                    }
                };

                match value {
                    Value::Var(var) if literal.is_positive() => lits.push(var),
                    Value::Var(var) => lits.push(!var),
                    Value::Constant(present) => satisfied |= present == literal.is_positive(),
                }
            }

            if satisfied {
                continue;
            }

            if lits.is_empty() {
                ret.contradiction = true;
            } else {
                ret.solver.add_clause(&lits);
            }
        }

        ret
    }

    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Returns an instance for the next model, if any.
    pub fn solve(&mut self) -> Option<Instance> {
        if self.contradiction {
            return None;
        }

        match self.solver.solve() {
            Lbool::True => Some(self.instance()),
            Lbool::False => None,
            #[cfg(not(tarpaulin_include))]
            Lbool::Undef => panic!("Solve timed out without time limit."),
        }
    }

    /// Forbids the current model.
    pub fn block_model(&mut self) {
        if self.vars.is_empty() {
            self.contradiction = true;
            return;
        }

        let nogood = gadgets::model_literals(&self.solver, &self.vars);
        gadgets::add_nogood(&mut self.solver, &nogood);
    }

    fn in_lower_bound(&self, relation: &Relation, tuple: &[Atom]) -> bool {
        self.lower
            .iter()
            .find(|(candidate, _)| candidate == relation)
            .map_or(false, |(_, lower)| lower.contains(tuple))
    }

    fn new_var(&mut self, key: Key) -> Lit {
        assert_eq!(self.vars.len(), self.solver.nvars() as usize);

        let var = self.solver.new_var();
        self.vars.push(var);
        self.meaning.push(key.clone());
        self.to_var.insert(key, var);
        var
    }

    fn instance(&self) -> Instance {
        let mut tuples: HashMap<&Relation, TupleSet> = self
            .lower
            .iter()
            .map(|(relation, lower)| (relation, lower.clone()))
            .collect();

        let model = self.solver.get_model();
        for (var, (relation, tuple)) in self.vars.iter().zip(&self.meaning) {
            if model[var.var() as usize] != Lbool::True {
                continue;
            }

            if let Some(set) = tuples.get_mut(relation) {
                // The tuple came from the relation's upper bound.
                let _ = set.add(tuple);
            }
        }

        let mut ret = Instance::new(self.universe.clone());
        for (relation, _) in &self.lower {
            if let Some(set) = tuples.remove(relation) {
                // Same universe and arity by construction.
                let _ = ret.add(relation, set);
            }
        }

        ret
    }
}
