use temporal_bounds::BoundsError;
use thiserror::Error;

/// Problems that keep a decomposed solving session from starting (or
/// from dispatching more work).  Running out of solutions is not an
/// error: it is reported through the result stream.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid session configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("could not parse session configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("phase-2 universe is missing atom {0} from the phase-1 universe")]
    UniverseMismatch(String),
    #[error("worker pool no longer accepts jobs")]
    PoolClosed,
    #[error(transparent)]
    Bounds(#[from] BoundsError),
}
