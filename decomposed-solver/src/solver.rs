//! The solving routine is an external collaborator: we only need to
//! solve a formula under bounds, enumerate every solution of a
//! formula, and conjoin two formulas.  Both calls may be arbitrarily
//! slow and are synchronous.
use std::fmt::Debug;
use temporal_bounds::Bounds;
use temporal_bounds::Instance;

/// Formulas are opaque, except that we must be able to build the
/// conjunction of the two phases for hybrid jobs.
pub trait Formula: Clone + Debug + Send + Sync + 'static {
    #[must_use]
    fn and(&self, other: &Self) -> Self;
}

pub trait Solver: Send + Sync + 'static {
    type Formula: Formula;

    /// Returns one solution for `formula` under `bounds`.
    fn solve(&self, formula: &Self::Formula, bounds: &Bounds) -> Solution;

    /// Lazily enumerates solutions for `formula` under `bounds`.
    ///
    /// By convention, the sequence consists of satisfiable solutions,
    /// followed by exactly one unsatisfiable solution once the search
    /// space is exhausted.  An unsatisfiable problem thus yields a
    /// single unsatisfiable solution.
    fn solve_all<'a>(
        &'a self,
        formula: &Self::Formula,
        bounds: &Bounds,
    ) -> Box<dyn Iterator<Item = Solution> + 'a>;
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome {
    Satisfiable,
    Unsatisfiable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    outcome: Outcome,
    instance: Option<Instance>,
}

impl Solution {
    #[must_use]
    pub fn satisfiable(instance: Instance) -> Self {
        Self {
            outcome: Outcome::Satisfiable,
            instance: Some(instance),
        }
    }

    #[must_use]
    pub fn unsatisfiable() -> Self {
        Self {
            outcome: Outcome::Unsatisfiable,
            instance: None,
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[must_use]
    pub fn sat(&self) -> bool {
        self.outcome == Outcome::Satisfiable
    }

    /// The satisfying instance, for satisfiable solutions.
    #[must_use]
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }
}
