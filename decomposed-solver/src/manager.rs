//! A `DProblemManager` drives one decomposed solving session.
//!
//! The producer (`run`) enumerates solutions of the cheap phase-1
//! formula ("configurations"), wraps each into an instance job that
//! solves the phase-2 formula with the configuration pinned, and
//! feeds these jobs to a fixed-size worker pool.  Optionally, a
//! high-priority hybrid job solves both phases at once, and races
//! against the decomposition.
//!
//! Finished jobs come back through `end`, which publishes satisfiable
//! outcomes on a small bounded channel, and decides when the session
//! is over.  Consumers pull results with `wait_until` until they see
//! `DSolution::Done`, which is always the last value published.
//!
//! The session ends exactly once, as soon as one of the following
//! holds:
//!  - the phase-1 formula is unsatisfiable;
//!  - the hybrid job finished (its answer is authoritative either way);
//!  - an instance job found a solution;
//!  - the enumeration is exhausted and the only job still running, if
//!    any, is the hybrid job.
//!
//! Ending the session publishes `Done`, purges queued jobs and
//! resets the running count.  Jobs that were already running finish
//! on their own time, but their outcome is dropped.
use crate::DSolution;
use crate::Formula;
use crate::JobState;
use crate::SchedulerError;
use crate::SessionConfig;
use crate::Solver;
use crate::WorkerPool;
use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::sync::Weak;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use temporal_bounds::Bounds;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// The producer stops enumerating configurations once this many
/// instance jobs wait for dispatch.
pub const MAX_BACKLOG: usize = 200;

/// Capacity of the result channel: finishers block when consumers
/// fall this far behind.
pub const RESULT_CAPACITY: usize = 10;

/// Sessions only move forward: `Active`, then `ShuttingDown` while
/// the session is being torn down, then `ShutDown`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SessionState {
    Active = 0,
    ShuttingDown = 1,
    ShutDown = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Active,
            1 => SessionState::ShuttingDown,
            _ => SessionState::ShutDown,
        }
    }
}

/// What to do with a result when the channel is full.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Publish {
    Blocking,
    IfRoom,
}

type Shared<F> = Arc<DSolution<F>>;

pub struct DProblemManager<S: Solver> {
    formula1: S::Formula,
    formula2: S::Formula,
    bounds1: Bounds,
    bounds2: Bounds,
    hybrid_bounds: Option<Bounds>,
    solver: S,
    config: SessionConfig,
    pool: WorkerPool<Shared<S::Formula>>,
    running: AtomicUsize,
    state: AtomicU8,
    hybrid_outstanding: AtomicBool,
    history: Mutex<Vec<Shared<S::Formula>>>,
    // Held while publishing, so that nothing follows `Done`.  `None`
    // once `Done` is out.
    publish: Mutex<Option<Sender<Shared<S::Formula>>>>,
    results_rx: Receiver<Shared<S::Formula>>,
}

impl<S: Solver> DProblemManager<S> {
    /// Sets up a session and its worker pool.  Nothing is solved
    /// until `run` (or `spawn`).
    ///
    /// # Errors
    ///
    /// Returns `Err` for invalid configurations, when phase-2 bounds
    /// cannot represent phase-1 configurations, or, with hybrid racing
    /// enabled, when the two bound sets cannot be merged.
    pub fn new(
        formula1: S::Formula,
        formula2: S::Formula,
        bounds1: Bounds,
        bounds2: Bounds,
        solver: S,
        config: SessionConfig,
    ) -> Result<Arc<Self>, SchedulerError> {
        config.validate()?;
        if let Some(missing) = bounds1
            .universe()
            .iter()
            .find(|atom| !bounds2.universe().contains(atom))
        {
            return Err(SchedulerError::UniverseMismatch(missing.to_string()));
        }

        let hybrid_bounds = if config.hybrid {
            Some(bounds1.merge(&bounds2)?)
        } else {
            None
        };

        let (results_tx, results_rx) = bounded(RESULT_CAPACITY);
        Ok(Arc::new_cyclic(|manager: &Weak<Self>| {
            let manager = manager.clone();
            let pool = WorkerPool::new(config.threads, move |job| {
                if let Some(manager) = manager.upgrade() {
                    manager.work(job);
                }
            });

            Self {
                formula1,
                formula2,
                bounds1,
                bounds2,
                hybrid_bounds,
                solver,
                config,
                pool,
                running: AtomicUsize::new(0),
                state: AtomicU8::new(SessionState::Active as u8),
                hybrid_outstanding: AtomicBool::new(false),
                history: Mutex::new(Vec::new()),
                publish: Mutex::new(Some(results_tx)),
                results_rx,
            }
        }))
    }

    /// Runs `run` on a dedicated producer thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn a thread.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<(), SchedulerError>> {
        let manager = self.clone();
        thread::Builder::new()
            .name("dsolver-producer".into())
            .spawn(move || manager.run())
            .expect("failed to spawn producer thread")
    }

    /// Enumerates configurations and dispatches instance jobs until
    /// the enumeration is exhausted or the session ends, then closes
    /// the pool to new jobs.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a configuration cannot be pinned in the
    /// phase-2 bounds.  The session is over by then.
    pub fn run(&self) -> Result<(), SchedulerError> {
        info!(
            threads = self.config.threads,
            hybrid = self.config.hybrid,
            "starting decomposed solving session"
        );

        if let Some(bounds) = &self.hybrid_bounds {
            let formula = self.formula1.and(&self.formula2);
            self.hybrid_outstanding.store(true, Ordering::SeqCst);
            self.dispatch(Arc::new(DSolution::hybrid(formula, bounds.clone())));
        }

        let mut configs = self.solver.solve_all(&self.formula1, &self.bounds1);
        let mut backlog: VecDeque<Shared<S::Formula>> = VecDeque::new();
        let mut first = true;
        let mut exhausted = false;

        while !exhausted && self.is_active() {
            while !exhausted && backlog.len() < MAX_BACKLOG && self.is_active() {
                let mut batch = Vec::with_capacity(self.config.configs_per_job);
                while batch.len() < self.config.configs_per_job && self.is_active() {
                    let config = match configs.next() {
                        Some(config) => config,
                        None => {
                            exhausted = true;
                            break;
                        }
                    };

                    if config.sat() {
                        batch.push(config);
                    } else if first {
                        // No configuration means no worker will ever
                        // end the session for us.
                        info!("phase-1 formula is unsatisfiable");
                        self.shutdown();
                    }

                    first = false;
                }

                if batch.is_empty() {
                    continue;
                }

                match DSolution::instance(batch, self.formula2.clone(), &self.bounds2) {
                    Ok(job) => backlog.push_back(Arc::new(job)),
                    Err(err) => {
                        warn!(%err, "cannot pin configuration in phase-2 bounds");
                        self.shutdown();
                        return Err(err.into());
                    }
                }
            }

            while self.is_active() {
                match backlog.pop_front() {
                    Some(job) => self.dispatch(job),
                    None => break,
                }
            }
        }

        drop(configs);
        for job in backlog {
            if let Some(job) = job.job() {
                job.transition(JobState::Cancelled);
            }
        }

        debug!(exhausted, "configuration enumeration stopped");
        self.pool.shutdown();
        self.shutdown_if_idle();
        Ok(())
    }

    /// Records the outcome of `job`, publishes it if satisfiable, and
    /// ends the session when appropriate.  Called once per finished
    /// job, from the worker that ran it.
    pub fn end(&self, job: Shared<S::Formula>) {
        let inner = match job.job() {
            Some(inner) => inner,
            None => {
                warn!("terminal marker passed to end");
                return;
            }
        };
        let sat = job.sat();
        // The first answer ends the session, and so does the hybrid
        // job whatever its outcome.
        let last = sat || job.is_hybrid();

        {
            let mut results = self.results();
            if !self.is_active() {
                inner.transition(JobState::Cancelled);
                return;
            }

            self.decrement_running();
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(job.clone());

            // Leave `Active` before the answer is visible: the producer
            // and other finishers must not act on a settled session.
            if last {
                self.claim();
            }

            if sat {
                inner.transition(JobState::Published);
                if !send(&results, job.clone(), Publish::Blocking) {
                    warn!("result channel closed; dropping solution");
                }
            } else {
                inner.transition(JobState::Discarded);
            }

            if last {
                info!(sat, hybrid = job.is_hybrid(), "session settled");
                close(&mut results, Publish::Blocking);
            }
        }

        if last {
            self.teardown();
        } else {
            debug!(running = self.running(), "instance job found no solution");
            if self.pool.is_shutdown() {
                self.shutdown_if_idle();
            }
        }
    }

    /// Ends the session: publishes `Done`, resets the running count,
    /// and cancels every queued job.  Only the first call has any
    /// effect.
    pub fn shutdown(&self) {
        {
            let mut results = self.results();
            if !self.claim() {
                return;
            }

            info!(running = self.running(), "shutting down decomposed solving session");
            close(&mut results, Publish::Blocking);
        }

        self.teardown();
    }

    /// Blocks until the next result: a satisfiable job, or `Done`.
    /// Once `Done` has been received, keeps returning `Done`.
    pub fn wait_until(&self) -> Shared<S::Formula> {
        self.results_rx
            .recv()
            .unwrap_or_else(|_| Arc::new(DSolution::Done))
    }

    /// Same as `wait_until`, but gives up with `None` after
    /// `timeout`.
    pub fn wait_until_timeout(&self, timeout: Duration) -> Option<Shared<S::Formula>> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(job) => Some(job),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Arc::new(DSolution::Done)),
        }
    }

    /// Ends the session if needed, and waits for the workers to exit.
    /// Results the consumer has not read yet may be dropped.  Must not
    /// be called from a worker.
    pub fn terminate(&self) {
        if self.is_active() {
            let claimed = {
                let mut results = loop {
                    match self.publish.try_lock() {
                        Ok(results) => break results,
                        Err(TryLockError::Poisoned(poisoned)) => break poisoned.into_inner(),
                        // The holder may be stuck on a full channel.
                        Err(TryLockError::WouldBlock) => {
                            let _ = self.results_rx.recv_timeout(Duration::from_millis(1));
                        }
                    }
                };

                let claimed = self.claim();
                if claimed {
                    warn!("terminating a live session");
                    close(&mut results, Publish::IfRoom);
                }

                claimed
            };

            if claimed {
                self.teardown();
            }
        }

        self.pool.join();
    }

    /// Every job that finished while the session was active, in
    /// completion order.
    #[must_use]
    pub fn solutions(&self) -> Vec<Shared<S::Formula>> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn sats(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|job| job.sat())
            .count()
    }

    /// Number of dispatched jobs that have not finished yet.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    #[must_use]
    pub fn bounds1(&self) -> &Bounds {
        &self.bounds1
    }

    #[must_use]
    pub fn bounds2(&self) -> &Bounds {
        &self.bounds2
    }

    #[must_use]
    pub fn formula1(&self) -> &S::Formula {
        &self.formula1
    }

    #[must_use]
    pub fn formula2(&self) -> &S::Formula {
        &self.formula2
    }

    fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Worker entry point.
    fn work(&self, job: Shared<S::Formula>) {
        let inner = match job.job() {
            Some(inner) => inner,
            None => return,
        };

        if !self.is_active() || !inner.transition(JobState::Running) {
            inner.transition(JobState::Cancelled);
            return;
        }

        inner.run(&self.solver);
        if !self.is_active() {
            debug!("dropping outcome of job finished after shutdown");
            inner.transition(JobState::Cancelled);
            return;
        }

        self.end(job);
    }

    fn dispatch(&self, job: Shared<S::Formula>) {
        let inner = match job.job() {
            Some(inner) => inner,
            None => return,
        };
        let priority = inner.priority();

        inner.transition(JobState::Queued);
        // Count the job before a worker can possibly finish it.
        self.running.fetch_add(1, Ordering::SeqCst);
        match self.pool.execute(job.clone(), priority) {
            Ok(()) => debug!(?priority, "dispatched job"),
            Err(err) => {
                debug!(%err, "dropping job");
                self.decrement_running();
                inner.transition(JobState::Cancelled);
            }
        }
    }

    /// Ends the session if no job that may still publish is running.
    /// Only meaningful once the pool is closed.
    fn shutdown_if_idle(&self) {
        let running = self.running();
        if running == 0 || (running == 1 && self.hybrid_outstanding.load(Ordering::SeqCst)) {
            self.shutdown();
        }
    }

    fn decrement_running(&self) {
        // `teardown` may have reset the count under our feet.
        let _ = self
            .running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |x| x.checked_sub(1));
    }

    fn results(&self) -> MutexGuard<'_, Option<Sender<Shared<S::Formula>>>> {
        self.publish.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the session out of `Active`.  Returns false if it already
    /// was.  Callers hold the `publish` lock, and must `teardown` when
    /// this returns true.
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Active as u8,
                SessionState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn teardown(&self) {
        for job in self.pool.shutdown_now() {
            if let Some(job) = job.job() {
                job.transition(JobState::Cancelled);
            }
        }

        self.running.store(0, Ordering::SeqCst);
        self.hybrid_outstanding.store(false, Ordering::SeqCst);
        self.state
            .store(SessionState::ShutDown as u8, Ordering::SeqCst);
    }
}

fn send<F>(results: &Option<Sender<Shared<F>>>, job: Shared<F>, publish: Publish) -> bool {
    let results = match results {
        Some(results) => results,
        None => return false,
    };

    match publish {
        Publish::Blocking => results.send(job).is_ok(),
        Publish::IfRoom => results.try_send(job).is_ok(),
    }
}

/// Publishes `Done`, and closes the result channel behind it.
fn close<F>(results: &mut Option<Sender<Shared<F>>>, publish: Publish) {
    if !send(results, Arc::new(DSolution::Done), publish) {
        warn!("could not publish terminal marker");
    }

    *results = None;
}

#[cfg(test)]
use crate::testing::init_logging;
#[cfg(test)]
use crate::testing::pick;
#[cfg(test)]
use crate::testing::problem;
#[cfg(test)]
use crate::testing::Name;
#[cfg(test)]
use crate::testing::ScriptedSolver;

#[cfg(test)]
const PATIENCE: Duration = Duration::from_secs(20);

/// Pulls results until `Done`, and returns the satisfiable ones.
#[cfg(test)]
fn drain<S: Solver>(manager: &DProblemManager<S>) -> Vec<Shared<S::Formula>> {
    let mut ret = Vec::new();
    loop {
        let job = manager.wait_until_timeout(PATIENCE).expect("session hung");
        if job.is_done() {
            // Nothing may follow the terminal marker.
            let next = manager
                .wait_until_timeout(Duration::from_millis(50))
                .expect("closed channel");
            assert!(next.is_done());
            return ret;
        }

        assert!(job.sat());
        ret.push(job);
    }
}

#[test]
fn test_unsat_phase1_terminates() {
    init_logging();
    let (bounds1, bounds2) = problem(4);
    let solver = ScriptedSolver::new(&bounds1, 0, &[]);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    let producer = manager.spawn();
    assert!(drain(&manager).is_empty());
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    assert_eq!(manager.state(), SessionState::ShutDown);
    assert_eq!(manager.solver().solve_calls(), 0);
    assert!(manager.solutions().is_empty());
}

#[test]
fn test_empty_enumeration_terminates() {
    init_logging();
    let (bounds1, bounds2) = problem(4);
    let solver = ScriptedSolver::new(&bounds1, 0, &[]).without_final_unsat();
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    manager.run().expect("ok");
    assert!(drain(&manager).is_empty());
    manager.terminate();
}

#[test]
fn test_exhausted_configurations() {
    init_logging();
    let (bounds1, bounds2) = problem(4);
    let solver = ScriptedSolver::new(&bounds1, 3, &[]);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    let producer = manager.spawn();
    assert!(drain(&manager).is_empty());
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    let history = manager.solutions();
    assert_eq!(history.len(), 3);
    assert!(history
        .iter()
        .all(|job| job.state() == Some(JobState::Discarded)));
    assert_eq!(manager.solver().solve_calls(), 3);
    assert_eq!(manager.running(), 0);
    assert_eq!(manager.sats(), 0);
}

#[test]
fn test_first_solution_wins() {
    init_logging();
    let (bounds1, bounds2) = problem(4);
    let solver = ScriptedSolver::new(&bounds1, 3, &[1]);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    let producer = manager.spawn();
    let results = drain(&manager);
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    assert_eq!(results.len(), 1);
    let instance = results[0].found_instance().expect("instance");
    let picked = instance.tuples(pick()).expect("pick");
    assert!(picked.contains(&["c1".into()]));
    assert_eq!(results[0].state(), Some(JobState::Published));
    assert!(manager.solutions().len() <= 3);
}

#[test]
fn test_no_dispatch_after_solution() {
    init_logging();
    // More configurations than fit in the backlog, and only the very
    // first one has a solution.
    let (bounds1, bounds2) = problem(300);
    let solver =
        ScriptedSolver::new(&bounds1, 300, &[0]).with_instance_delay(Duration::from_millis(2));
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    let producer = manager.spawn();
    let results = drain(&manager);
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    assert_eq!(results.len(), 1);
    let calls = manager.solver().solve_calls();
    assert!(calls < 300, "solved {} instances", calls);

    // Everything has stopped.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(manager.solver().solve_calls(), calls);
    assert_eq!(manager.state(), SessionState::ShutDown);
}

#[test]
fn test_batched_configurations() {
    init_logging();
    let (bounds1, bounds2) = problem(4);
    let solver = ScriptedSolver::new(&bounds1, 4, &[]);
    let config = SessionConfig {
        threads: 3,
        hybrid: false,
        configs_per_job: 2,
    };
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        config,
    )
    .expect("ok");

    manager.spawn().join().expect("no panic").expect("ok");
    assert!(drain(&manager).is_empty());
    manager.terminate();

    let history = manager.solutions();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|job| job.configs().len() == 2));
    assert_eq!(manager.solver().solve_calls(), 4);
}

#[test]
fn test_hybrid_wins_race() {
    init_logging();
    let (bounds1, bounds2) = problem(5);
    let solver = ScriptedSolver::new(&bounds1, 5, &[])
        .with_hybrid(true)
        .with_instance_delay(Duration::from_millis(20));
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(1, true),
    )
    .expect("ok");

    let producer = manager.spawn();
    let results = drain(&manager);
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_hybrid());
    assert!(manager.solver().hybrid_formulas()[0].0.contains('&'));
}

#[test]
fn test_hybrid_refutation_is_authoritative() {
    init_logging();
    let (bounds1, bounds2) = problem(5);
    let solver = ScriptedSolver::new(&bounds1, 5, &[4])
        .with_hybrid(false)
        .with_instance_delay(Duration::from_millis(20));
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(1, true),
    )
    .expect("ok");

    let producer = manager.spawn();
    let results = drain(&manager);
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    assert!(results.is_empty());
    let history = manager.solutions();
    assert!(history.iter().any(|job| job.is_hybrid()));
}

#[test]
fn test_exhausted_decomposition_beats_hybrid() {
    init_logging();
    let (bounds1, bounds2) = problem(3);
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let solver = ScriptedSolver::new(&bounds1, 3, &[])
        .with_hybrid(true)
        .with_hybrid_gate(gate);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, true),
    )
    .expect("ok");

    let producer = manager.spawn();
    // The hybrid job is stuck, but every configuration has been
    // refuted: the session is over.
    assert!(drain(&manager).is_empty());
    producer.join().expect("no panic").expect("ok");

    drop(release);
    manager.terminate();

    assert_eq!(manager.solutions().len(), 3);
    assert!(manager.solutions().iter().all(|job| !job.is_hybrid()));
}

#[test]
fn test_rejects_bad_sessions() {
    use temporal_bounds::Atom;
    use temporal_bounds::Universe;

    let (bounds1, bounds2) = problem(2);
    let solver = ScriptedSolver::new(&bounds1, 0, &[]);
    assert!(matches!(
        DProblemManager::new(
            Name::new("f1"),
            Name::new("f2"),
            bounds1.clone(),
            bounds2,
            solver,
            SessionConfig::new(0, false),
        ),
        Err(SchedulerError::InvalidConfig(_))
    ));

    let narrow = Bounds::new(Arc::new(Universe::new(vec![Atom::new("c0")]).expect("ok")));
    let solver = ScriptedSolver::new(&bounds1, 0, &[]);
    assert!(matches!(
        DProblemManager::new(
            Name::new("f1"),
            Name::new("f2"),
            bounds1,
            narrow,
            solver,
            SessionConfig::new(1, false),
        ),
        Err(SchedulerError::UniverseMismatch(_))
    ));
}

#[test]
fn test_first_answer_settles_session() {
    init_logging();
    let every: Vec<usize> = (0..300).collect();
    for _ in 0..10 {
        let (bounds1, bounds2) = problem(300);
        let solver = ScriptedSolver::new(&bounds1, 300, &every);
        let manager = DProblemManager::new(
            Name::new("f1"),
            Name::new("f2"),
            bounds1,
            bounds2,
            solver,
            SessionConfig::new(8, false),
        )
        .expect("ok");

        let producer = manager.spawn();
        let first = manager.wait_until_timeout(PATIENCE).expect("session hung");
        assert!(first.sat());
        // The session left `Active` before the answer was visible.
        assert_ne!(manager.state(), SessionState::Active);
        assert!(manager.wait_until().is_done());

        producer.join().expect("no panic").expect("ok");
        manager.terminate();
        assert_eq!(manager.state(), SessionState::ShutDown);
        assert_eq!(manager.sats(), 1);
        assert!(manager.wait_until().is_done());
    }
}

#[test]
fn test_backlog_is_capped() {
    init_logging();
    let (bounds1, bounds2) = problem(300);
    let solver = ScriptedSolver::new(&bounds1, 300, &[]).with_pull_gate(MAX_BACKLOG);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(2, false),
    )
    .expect("ok");

    let producer = manager.spawn();
    assert!(drain(&manager).is_empty());
    producer.join().expect("no panic").expect("ok");
    manager.terminate();

    // Nothing runs until the backlog is full, and the producer hands
    // it over before pulling more.
    let pulls = manager.solver().solves_at_pull();
    assert!(pulls.len() > MAX_BACKLOG);
    assert!(pulls[..MAX_BACKLOG].iter().all(|&calls| calls == 0));
    assert!(pulls[MAX_BACKLOG] > 0);
    assert_eq!(manager.solutions().len(), 300);
}

#[test]
fn test_result_channel_capacity() {
    let (bounds1, bounds2) = problem(2);
    let solver = ScriptedSolver::new(&bounds1, 0, &[]);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(1, false),
    )
    .expect("ok");

    assert_eq!(manager.results_rx.capacity(), Some(RESULT_CAPACITY));
    manager.terminate();
}

#[test]
fn test_terminate_live_session() {
    init_logging();
    let (bounds1, bounds2) = problem(3);
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    let solver = ScriptedSolver::new(&bounds1, 3, &[0, 1, 2])
        .with_hybrid(true)
        .with_hybrid_gate(gate);
    let manager = DProblemManager::new(
        Name::new("f1"),
        Name::new("f2"),
        bounds1,
        bounds2,
        solver,
        SessionConfig::new(1, true),
    )
    .expect("ok");

    // The only worker is stuck on the hybrid job, with every instance
    // job queued behind it.
    manager.spawn().join().expect("no panic").expect("ok");
    assert_eq!(manager.state(), SessionState::Active);
    assert_eq!(manager.running(), 4);

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        drop(release);
    });
    manager.terminate();
    releaser.join().expect("no panic");

    assert_eq!(manager.state(), SessionState::ShutDown);
    assert_eq!(manager.running(), 0);
    assert!(manager.wait_until().is_done());
    // The channel is closed behind the terminal marker.
    assert!(manager
        .wait_until_timeout(Duration::from_millis(10))
        .expect("closed channel")
        .is_done());
    assert_eq!(manager.solver().solve_calls(), 1);
    assert!(manager.solutions().is_empty());
}
