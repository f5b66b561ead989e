//! Everything that can go wrong while building universes, tuple
//! sets and bounds is a configuration error: the caller handed us
//! inconsistent data, and retrying will not help.  Violations of the
//! universe-extension invariant are *not* represented here; they
//! indicate a bug, and panic instead.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundsError {
    #[error("bounds must be resolved")]
    Unresolved,
    #[error("invalid trace parameter {name}={value}: must be at least 1")]
    InvalidTraceParameter { name: &'static str, value: usize },
    #[error("a universe must contain at least one atom")]
    EmptyUniverse,
    #[error("duplicate atom {0} in universe")]
    DuplicateAtom(String),
    #[error("atom {0} does not belong to the universe")]
    UnknownAtom(String),
    #[error("arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("tuple sets are defined over different universes")]
    UniverseMismatch,
    #[error("relation {0} has no bound")]
    Unbound(String),
    #[error("lower bound of {0} is not a subset of its upper bound")]
    LowerNotSubset(String),
    #[error("range from {from} to {to} is empty")]
    EmptyRange { from: String, to: String },
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
