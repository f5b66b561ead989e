//! Decomposed solving: enumerate the solutions ("configurations") of
//! a cheap phase-1 problem, then search for a phase-2 solution with
//! each configuration pinned, in parallel, stopping at the first
//! solution.
//!
//! A `DProblemManager` owns the session: the producer that feeds
//! instance jobs to a priority `WorkerPool`, the optional hybrid job
//! that races the whole problem against the decomposition, and the
//! bounded result stream consumers read with `wait_until`.
//!
//! The actual solving is delegated to an implementation of `Solver`.
//! With the `cryptominisat` feature, `sat::CmsSolver` provides one
//! for formulas in clausal form.
mod config;
mod error;
mod job;
mod manager;
mod pool;
mod solver;

#[cfg(feature = "cryptominisat")]
pub mod sat;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use error::SchedulerError;
pub use job::DSolution;
pub use job::Job;
pub use job::JobState;
pub use job::Priority;
pub use manager::DProblemManager;
pub use manager::SessionState;
pub use manager::MAX_BACKLOG;
pub use manager::RESULT_CAPACITY;
pub use pool::WorkerPool;
pub use solver::Formula;
pub use solver::Outcome;
pub use solver::Solution;
pub use solver::Solver;
