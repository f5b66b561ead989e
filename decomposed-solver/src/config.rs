//! Session-level knobs.  A session configuration deserialises from
//! TOML; every key is optional:
//!
//! ```toml
//! threads = 4
//! hybrid = true
//! configs_per_job = 1
//! ```
use crate::SchedulerError;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Whether to race the undecomposed problem against the
    /// decomposition.
    pub hybrid: bool,
    /// Number of phase-1 configurations batched in each instance job.
    pub configs_per_job: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            hybrid: false,
            configs_per_job: 1,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(threads: usize, hybrid: bool) -> Self {
        Self {
            threads,
            hybrid,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns `Err` for malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, SchedulerError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `Err` unless `threads` and `configs_per_job` are
    /// positive.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "the worker pool needs at least one thread",
            ));
        }

        if self.configs_per_job == 0 {
            return Err(SchedulerError::InvalidConfig(
                "instance jobs need at least one configuration",
            ));
        }

        Ok(())
    }
}

#[test]
fn test_config_from_toml() {
    let config = SessionConfig::from_toml_str("threads = 2\nhybrid = true").expect("ok");

    assert_eq!(config, SessionConfig::new(2, true));
    assert_eq!(
        SessionConfig::from_toml_str("").expect("ok"),
        SessionConfig::default()
    );
}

#[test]
fn test_config_validation() {
    assert!(SessionConfig::from_toml_str("threads = 0").is_err());
    assert!(SessionConfig::from_toml_str("configs_per_job = 0").is_err());
    assert!(SessionConfig::from_toml_str("threads = \"many\"").is_err());
}
