// Engine Configuration
//
// Loaded from an optional TOML file plus REACHFLOW_-prefixed environment
// overrides; every field has a default so a bare engine works out of the
// box.

use crate::application::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_MAX_WAIT_MS, DEFAULT_SUBMIT_TIMEOUT_MS,
};
use crate::application::poller::PollConfig;
use crate::error::{AppError, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between successive job status queries
    pub poll_interval_ms: u64,
    /// Hard ceiling on how long a single poll waits for a terminal state
    pub poll_max_wait_ms: u64,
    /// Request-level timeout on a job submission call
    pub submit_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_max_wait_ms: DEFAULT_POLL_MAX_WAIT_MS,
            submit_timeout_ms: DEFAULT_SUBMIT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Load from `reachflow.toml` (if present) and `REACHFLOW_*` env vars.
    ///
    /// Example: `REACHFLOW_POLL_INTERVAL_MS=500` overrides the file value.
    pub fn load() -> Result<Self> {
        Self::load_from("reachflow")
    }

    pub fn load_from(file_stem: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("REACHFLOW"))
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_wait: Duration::from_millis(self.poll_max_wait_ms),
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.poll_interval_ms, 1500);
        assert_eq!(cfg.poll_max_wait_ms, 45_000);
        assert_eq!(cfg.poll_config().max_attempts(), 30);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = EngineConfig::load_from("does-not-exist").unwrap();
        assert_eq!(cfg.poll_interval_ms, EngineConfig::default().poll_interval_ms);
    }
}
