//! Scripted collaborators for scheduler tests.
//!
//! Problems range over atoms `c0 ... c{n-1}`, and phase-1 solutions
//! pick exactly one atom in the unary `pick` relation.  The scripted
//! solver decides, by index, which picks admit a phase-2 solution.
use crate::Formula;
use crate::Solution;
use crate::Solver;
use crossbeam_channel::Receiver;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;
use std::time::Instant;
use temporal_bounds::Atom;
use temporal_bounds::Bounds;
use temporal_bounds::Instance;
use temporal_bounds::Relation;
use temporal_bounds::TupleSet;
use temporal_bounds::Universe;

#[derive(Clone, Debug, PartialEq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: &str) -> Self {
        Name(name.to_owned())
    }
}

impl Formula for Name {
    fn and(&self, other: &Self) -> Self {
        Name(format!("{} & {}", self.0, other.0))
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pick() -> &'static Relation {
    static PICK: OnceLock<Relation> = OnceLock::new();
    PICK.get_or_init(|| Relation::unary("pick"))
}

/// Returns phase-1 and phase-2 bounds over `n` atoms.
pub fn problem(n: usize) -> (Bounds, Bounds) {
    let universe = Arc::new(
        Universe::new((0..n).map(|i| Atom::new(&format!("c{}", i)))).expect("ok"),
    );
    let all = TupleSet::from_tuples(&universe, 1, universe.iter().map(|atom| [atom.clone()]))
        .expect("ok");

    let mut bounds1 = Bounds::new(universe.clone());
    bounds1
        .bound(pick(), TupleSet::none_of(&universe, 1), all.clone())
        .expect("ok");

    let mut bounds2 = Bounds::new(universe.clone());
    bounds2
        .bound(pick(), TupleSet::none_of(&universe, 1), all)
        .expect("ok");
    (bounds1, bounds2)
}

pub struct ScriptedSolver {
    configs: Vec<Solution>,
    sat_picks: BTreeSet<usize>,
    hybrid: Option<bool>,
    hybrid_gate: Option<Receiver<()>>,
    instance_delay: Duration,
    pull_gate: Option<usize>,
    solve_calls: AtomicUsize,
    // Solve calls seen when each configuration was pulled.
    pulls: Mutex<Vec<usize>>,
    hybrid_formulas: Mutex<Vec<Name>>,
}

impl ScriptedSolver {
    /// Enumerates `count` configurations, then reports exhaustion.
    /// Instance jobs for the configurations in `sat_picks` succeed.
    pub fn new(bounds1: &Bounds, count: usize, sat_picks: &[usize]) -> Self {
        let universe = bounds1.universe();
        let mut configs: Vec<Solution> = universe
            .iter()
            .take(count)
            .map(|atom| {
                let mut instance = Instance::new(universe.clone());
                instance
                    .add(
                        pick(),
                        TupleSet::singleton(universe, &[atom.clone()]).expect("ok"),
                    )
                    .expect("ok");
                Solution::satisfiable(instance)
            })
            .collect();
        configs.push(Solution::unsatisfiable());

        Self {
            configs,
            sat_picks: sat_picks.iter().copied().collect(),
            hybrid: None,
            hybrid_gate: None,
            instance_delay: Duration::from_millis(0),
            pull_gate: None,
            solve_calls: AtomicUsize::new(0),
            pulls: Mutex::new(Vec::new()),
            hybrid_formulas: Mutex::new(Vec::new()),
        }
    }

    /// Drops the trailing unsatisfiable solution from the enumeration.
    pub fn without_final_unsat(mut self) -> Self {
        self.configs.pop();
        self
    }

    pub fn with_hybrid(mut self, sat: bool) -> Self {
        self.hybrid = Some(sat);
        self
    }

    /// Hybrid jobs block until `gate` disconnects.
    pub fn with_hybrid_gate(mut self, gate: Receiver<()>) -> Self {
        self.hybrid_gate = Some(gate);
        self
    }

    pub fn with_instance_delay(mut self, delay: Duration) -> Self {
        self.instance_delay = delay;
        self
    }

    /// Pulling configuration `index` waits until some instance job ran.
    pub fn with_pull_gate(mut self, index: usize) -> Self {
        self.pull_gate = Some(index);
        self
    }

    pub fn solves_at_pull(&self) -> Vec<usize> {
        self.pulls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn solve_calls(&self) -> usize {
        self.solve_calls.load(Ordering::SeqCst)
    }

    pub fn hybrid_formulas(&self) -> Vec<Name> {
        self.hybrid_formulas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn note_pull(&self, index: usize) {
        if self.pull_gate == Some(index) {
            let start = Instant::now();
            while self.solve_calls() == 0 && start.elapsed() < Duration::from_secs(10) {
                thread::sleep(Duration::from_millis(1));
            }
        }

        self.pulls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.solve_calls());
    }

    fn solve_hybrid(&self, formula: &Name, bounds: &Bounds) -> Solution {
        self.hybrid_formulas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(formula.clone());
        if let Some(gate) = &self.hybrid_gate {
            let _ = gate.recv();
        }

        match self.hybrid {
            Some(true) => Solution::satisfiable(Instance::new(bounds.universe().clone())),
            _ => Solution::unsatisfiable(),
        }
    }
}

impl Solver for ScriptedSolver {
    type Formula = Name;

    fn solve(&self, formula: &Name, bounds: &Bounds) -> Solution {
        self.solve_calls.fetch_add(1, Ordering::SeqCst);
        if formula.0.contains('&') {
            return self.solve_hybrid(formula, bounds);
        }

        if self.instance_delay > Duration::from_millis(0) {
            thread::sleep(self.instance_delay);
        }

        let universe = bounds.universe();
        let picked = bounds
            .lower_bound(pick())
            .and_then(|tuples| tuples.iter().next())
            .expect("configuration is pinned");
        let index = universe.index(&picked[0]).expect("known atom");
        if !self.sat_picks.contains(&index) {
            return Solution::unsatisfiable();
        }

        let mut instance = Instance::new(universe.clone());
        instance
            .add(pick(), TupleSet::singleton(universe, &picked).expect("ok"))
            .expect("ok");
        Solution::satisfiable(instance)
    }

    fn solve_all<'a>(
        &'a self,
        _formula: &Name,
        _bounds: &Bounds,
    ) -> Box<dyn Iterator<Item = Solution> + 'a> {
        Box::new(
            self.configs
                .iter()
                .cloned()
                .enumerate()
                .map(move |(index, config)| {
                    self.note_pull(index);
                    config
                }),
        )
    }
}
