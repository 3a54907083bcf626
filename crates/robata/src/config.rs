//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ConfigError;

pub const ENV_MAX_BATCH_SIZE: &str = "ROBATA_MAX_BATCH_SIZE";
pub const ENV_BATCH_TIMEOUT_MS: &str = "ROBATA_BATCH_TIMEOUT_MS";
pub const ENV_MAX_WORKERS: &str = "ROBATA_MAX_WORKERS";
pub const ENV_BATCHING_ENABLED: &str = "ROBATA_BATCHING_ENABLED";

/// Batcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Largest number of requests collected into one batch.
    pub max_batch_size: usize,
    /// How long a collection window stays open before a partial batch is dispatched.
    pub batch_timeout: Duration,
    /// Number of requests that may be processed at the same time.
    pub max_workers: usize,
    /// When disabled every request is dispatched as a batch of one.
    pub batching_enabled: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            batch_timeout: Duration::from_millis(100),
            max_workers: 4,
            batching_enabled: true,
        }
    }
}

impl BatchConfig {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_batch_timeout(mut self, batch_timeout: Duration) -> Self {
        self.batch_timeout = batch_timeout;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_batching(mut self, batching_enabled: bool) -> Self {
        self.batching_enabled = batching_enabled;
        self
    }

    /// Number of requests the collector takes per window.
    pub fn effective_batch_size(&self) -> usize {
        if self.batching_enabled {
            self.max_batch_size
        } else {
            1
        }
    }

    /// Reject settings the batcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_workers > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                key: "max_workers".to_string(),
                message: format!("must be at most {}", Semaphore::MAX_PERMITS),
            });
        }
        Ok(())
    }

    /// Defaults overlaid with any `ROBATA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values produced by `lookup`, keyed by the
    /// `ROBATA_*` variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_BATCH_SIZE) {
            config.max_batch_size = parse_number(ENV_MAX_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BATCH_TIMEOUT_MS) {
            config.batch_timeout = Duration::from_millis(parse_number(ENV_BATCH_TIMEOUT_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_MAX_WORKERS) {
            config.max_workers = parse_number(ENV_MAX_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BATCHING_ENABLED) {
            config.batching_enabled = parse_flag(ENV_BATCHING_ENABLED, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a non-negative integer, got {raw:?}"),
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {raw:?}"),
        }),
    }
}
