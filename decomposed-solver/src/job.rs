//! A `DSolution` is the unit of work a decomposed solving session
//! schedules, and, once done, the result it publishes.
//!
//! *Hybrid* jobs solve the conjunction of both phases over the merged
//! bounds; *instance* jobs solve the phase-2 formula once per
//! phase-1 configuration they carry, with the configuration pinned in
//! the bounds.  `Done` is the terminal sentinel of the result stream,
//! and is never scheduled.
//!
//! Jobs are created by the producer, record their outcome exactly
//! once, and are never reused.
use crate::Solution;
use crate::Solver;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use temporal_bounds::convert;
use temporal_bounds::Bounds;
use temporal_bounds::BoundsError;
use temporal_bounds::Instance;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Priority {
    High,
    Low,
}

/// Lifecycle of a job.  The last three states are terminal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobState {
    Created,
    Queued,
    Running,
    /// Finished without a solution.
    Discarded,
    /// Finished with a solution, which was published.
    Published,
    /// Dropped on shutdown, whether queued or still running.
    Cancelled,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Discarded | JobState::Published | JobState::Cancelled
        )
    }
}

pub struct Job<F> {
    formula: F,
    bounds: Vec<Bounds>,
    configs: Vec<Solution>,
    priority: Priority,
    state: Mutex<JobState>,
    outcome: OnceLock<Solution>,
}

impl<F> Job<F> {
    fn new(formula: F, bounds: Vec<Bounds>, configs: Vec<Solution>, priority: Priority) -> Self {
        Self {
            formula,
            bounds,
            configs,
            priority,
            state: Mutex::new(JobState::Created),
            outcome: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn formula(&self) -> &F {
        &self.formula
    }

    /// One set of bounds per problem the job solves, in order.
    #[must_use]
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the job to `next`, unless it already reached a terminal
    /// state.  Returns whether the transition happened.
    pub fn transition(&self, next: JobState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_terminal() {
            return false;
        }

        *state = next;
        true
    }

    /// Returns the recorded outcome, if the job ran to completion.
    #[must_use]
    pub fn outcome(&self) -> Option<&Solution> {
        self.outcome.get()
    }

    /// Solves every problem in turn, stopping at the first
    /// satisfiable one, and records the result.  Later calls return
    /// the recorded outcome without solving anything.
    pub fn run<S>(&self, solver: &S) -> &Solution
    where
        S: Solver<Formula = F>,
    {
        self.outcome.get_or_init(|| {
            for bounds in &self.bounds {
                let solution = solver.solve(&self.formula, bounds);
                if solution.sat() {
                    return solution;
                }
            }

            Solution::unsatisfiable()
        })
    }
}

pub enum DSolution<F> {
    Hybrid(Job<F>),
    Instance(Job<F>),
    Done,
}

impl<F> DSolution<F> {
    /// Returns a high-priority job for the undecomposed problem.
    #[must_use]
    pub fn hybrid(formula: F, bounds: Bounds) -> Self {
        DSolution::Hybrid(Job::new(formula, vec![bounds], Vec::new(), Priority::High))
    }

    /// Returns a low-priority job that solves `formula` under
    /// `bounds`, once for each configuration in `configs`, with every
    /// relation in the configuration bound exactly to its value.
    ///
    /// # Errors
    ///
    /// Returns `Err` when a configuration does not fit `bounds`
    /// (e.g., a relation with another arity).
    ///
    /// # Panics
    ///
    /// Panics if a configuration mentions an atom that is not in
    /// `bounds`' universe.
    pub fn instance(configs: Vec<Solution>, formula: F, bounds: &Bounds) -> Result<Self, BoundsError> {
        let mut problems = Vec::with_capacity(configs.len());
        for config in &configs {
            let mut pinned = bounds.clone();
            if let Some(instance) = config.instance() {
                pin_configuration(&mut pinned, instance)?;
            }

            problems.push(pinned);
        }

        Ok(DSolution::Instance(Job::new(
            formula,
            problems,
            configs,
            Priority::Low,
        )))
    }

    #[must_use]
    pub fn job(&self) -> Option<&Job<F>> {
        match self {
            DSolution::Hybrid(job) | DSolution::Instance(job) => Some(job),
            DSolution::Done => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, DSolution::Done)
    }

    #[must_use]
    pub fn is_hybrid(&self) -> bool {
        matches!(self, DSolution::Hybrid(_))
    }

    /// True iff the job ran and found a solution.
    #[must_use]
    pub fn sat(&self) -> bool {
        self.solution().map_or(false, Solution::sat)
    }

    #[must_use]
    pub fn solution(&self) -> Option<&Solution> {
        self.job()?.outcome()
    }

    /// The satisfying instance, once the job found one.
    #[must_use]
    pub fn found_instance(&self) -> Option<&Instance> {
        self.solution()?.instance()
    }

    /// The phase-1 configurations an instance job was built from.
    #[must_use]
    pub fn configs(&self) -> &[Solution] {
        match self {
            DSolution::Instance(job) => &job.configs,
            DSolution::Hybrid(_) | DSolution::Done => &[],
        }
    }

    #[must_use]
    pub fn priority(&self) -> Option<Priority> {
        self.job().map(Job::priority)
    }

    #[must_use]
    pub fn state(&self) -> Option<JobState> {
        self.job().map(Job::state)
    }
}

impl<F> std::fmt::Debug for DSolution<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DSolution::Hybrid(job) => write!(f, "Hybrid({:?}, {:?})", job.state(), job.outcome()),
            DSolution::Instance(job) => write!(
                f,
                "Instance[{}]({:?}, {:?})",
                job.configs.len(),
                job.state(),
                job.outcome()
            ),
            DSolution::Done => f.write_str("Done"),
        }
    }
}

fn pin_configuration(bounds: &mut Bounds, config: &Instance) -> Result<(), BoundsError> {
    let universe = bounds.universe().clone();
    for (relation, tuples) in config.iter() {
        bounds.bound_exactly(relation, convert(tuples, &universe))?;
    }

    Ok(())
}

#[test]
fn test_instance_job_pins_configurations() {
    use std::sync::Arc;
    use temporal_bounds::Atom;
    use temporal_bounds::Relation;
    use temporal_bounds::TupleSet;
    use temporal_bounds::Universe;
    use crate::testing::Name;

    let universe = Arc::new(
        Universe::new(vec![Atom::new("a"), "b".into(), "c".into()]).expect("ok"),
    );
    let pick = Relation::unary("pick");
    let other = Relation::unary("other");
    let all = TupleSet::range(&universe, &"a".into(), &"c".into()).expect("ok");

    let mut bounds2 = Bounds::new(universe.clone());
    bounds2
        .bound(&pick, TupleSet::none_of(&universe, 1), all.clone())
        .expect("ok");
    bounds2
        .bound(&other, TupleSet::none_of(&universe, 1), all)
        .expect("ok");

    let configs: Vec<Solution> = ["a", "c"]
        .iter()
        .map(|atom| {
            let mut instance = Instance::new(universe.clone());
            instance
                .add(&pick, TupleSet::singleton(&universe, &[Atom::new(atom)]).expect("ok"))
                .expect("ok");
            Solution::satisfiable(instance)
        })
        .collect();

    let job = DSolution::instance(configs, Name("f2".into()), &bounds2).expect("ok");
    assert_eq!(job.priority(), Some(Priority::Low));
    assert_eq!(job.state(), Some(JobState::Created));
    assert_eq!(job.configs().len(), 2);

    let problems = job.job().expect("job").bounds();
    assert_eq!(problems.len(), 2);
    let pinned = problems[1].lower_bound(&pick).expect("pick");
    assert_eq!(pinned.len(), 1);
    assert!(pinned.contains(&[Atom::new("c")]));
    assert_eq!(problems[1].upper_bound(&pick), Some(pinned));
    // Relations outside the configuration keep their phase-2 bounds.
    assert_eq!(problems[1].upper_bound(&other).expect("other").len(), 3);
}

#[test]
fn test_transitions_stop_at_terminal_states() {
    use std::sync::Arc;
    use temporal_bounds::Atom;
    use temporal_bounds::Universe;
    use crate::testing::Name;

    let universe = Arc::new(Universe::new(vec![Atom::new("a")]).expect("ok"));
    let job = DSolution::hybrid(Name("f".into()), Bounds::new(universe));
    let inner = job.job().expect("job");

    assert_eq!(job.priority(), Some(Priority::High));
    assert!(inner.transition(JobState::Queued));
    assert!(inner.transition(JobState::Running));
    assert!(inner.transition(JobState::Cancelled));
    assert!(!inner.transition(JobState::Published));
    assert_eq!(job.state(), Some(JobState::Cancelled));

    assert!(DSolution::<Name>::Done.job().is_none());
    assert!(!DSolution::<Name>::Done.sat());
}
