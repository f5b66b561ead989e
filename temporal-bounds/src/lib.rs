//! Bounds for bounded relational model finding, and their expansion
//! from relations that vary over time into static relations over an
//! explicitly unrolled trace.
//!
//! A `Bounds` maps each `Relation` to a pair of `TupleSet`s over a
//! `Universe` of atoms.  `expand` rewrites bounds over variable
//! relations into plain bounds over a universe extended with state
//! atoms, and binds the `TraceRelations` that describe the shape of
//! admissible traces.
mod bounds;
mod convert;
mod error;
mod expander;
mod instance;
mod relation;
mod trace;
mod tuple;
mod universe;

pub use bounds::Bounds;
pub use bounds::Provenance;
pub use convert::convert;
pub use error::BoundsError;
pub use expander::expand;
pub use expander::expand_universe;
pub use expander::Expansion;
pub use instance::Instance;
pub use relation::Relation;
pub use trace::TraceEncoding;
pub use trace::TraceParams;
pub use trace::TraceRelations;
pub use trace::LEVEL_ATOM;
pub use trace::STATE_ATOM;
pub use trace::STATE_SEP;
pub use tuple::TupleSet;
pub use universe::Atom;
pub use universe::Universe;
