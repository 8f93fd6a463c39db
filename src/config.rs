//! # Configuration
//!
//! Operational settings for the orchestrator: scheduler cadence, concurrency
//! bounds, retry/backoff behavior, remote-polling bounds, and retention.
//!
//! Configuration loads from defaults, an optional YAML file, and environment
//! variable overrides, in that order. Invalid values surface as
//! configuration errors rather than being silently replaced.

use crate::constants::system;
use crate::error::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Exponential backoff settings for job retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Base delay in milliseconds.
    pub base_ms: u64,
    /// Cap on any single delay in milliseconds.
    pub max_ms: u64,
    /// Exponential multiplier.
    pub multiplier: f64,
    /// Randomize delays to avoid synchronized retries. Off by default so
    /// delays stay deterministic.
    pub jitter_enabled: bool,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_ms: system::DEFAULT_BACKOFF_BASE_MS,
            max_ms: system::DEFAULT_BACKOFF_MAX_MS,
            multiplier: 2.0,
            jitter_enabled: false,
        }
    }
}

/// Bounds for remote-status polling loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Maximum polling attempts before the operation times out.
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: system::DEFAULT_POLL_MAX_ATTEMPTS,
            interval_ms: system::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scheduler tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Concurrent dispatch bound. The reference policy is one job at a time.
    pub max_concurrent_jobs: usize,
    /// Default retry budget for new jobs.
    pub default_max_retries: u32,
    pub backoff: BackoffSettings,
    pub poll: PollSettings,
    /// Jobs kept by the retention cleanup policy.
    pub retention_keep: usize,
    /// Process-wide dry-run default.
    pub dry_run: bool,
    /// Feature flag: when false, submissions are rejected outright.
    pub submissions_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: system::DEFAULT_TICK_INTERVAL_MS,
            max_concurrent_jobs: 1,
            default_max_retries: system::DEFAULT_MAX_RETRIES,
            backoff: BackoffSettings::default(),
            poll: PollSettings::default(),
            retention_keep: system::DEFAULT_JOB_RETENTION,
            dry_run: false,
            submissions_enabled: true,
        }
    }
}

impl OrchestratorConfig {
    /// Load defaults with environment variable overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("SHIPWAY_TICK_INTERVAL_MS") {
            config.tick_interval_ms = parse_env("SHIPWAY_TICK_INTERVAL_MS", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_MAX_CONCURRENT_JOBS") {
            config.max_concurrent_jobs = parse_env("SHIPWAY_MAX_CONCURRENT_JOBS", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_MAX_RETRIES") {
            config.default_max_retries = parse_env("SHIPWAY_MAX_RETRIES", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_BACKOFF_BASE_MS") {
            config.backoff.base_ms = parse_env("SHIPWAY_BACKOFF_BASE_MS", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_BACKOFF_MAX_MS") {
            config.backoff.max_ms = parse_env("SHIPWAY_BACKOFF_MAX_MS", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_RETENTION_KEEP") {
            config.retention_keep = parse_env("SHIPWAY_RETENTION_KEEP", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_DRY_RUN") {
            config.dry_run = parse_env("SHIPWAY_DRY_RUN", &value)?;
        }
        if let Ok(value) = std::env::var("SHIPWAY_SUBMISSIONS_ENABLED") {
            config.submissions_enabled = parse_env("SHIPWAY_SUBMISSIONS_ENABLED", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::configuration(path.display().to_string(), e.to_string())
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            OrchestratorError::configuration(path.display().to_string(), e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject configurations that cannot operate.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(OrchestratorError::configuration(
                "tick_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(OrchestratorError::configuration(
                "max_concurrent_jobs",
                "must be greater than zero",
            ));
        }
        if self.backoff.base_ms == 0 {
            return Err(OrchestratorError::configuration(
                "backoff.base_ms",
                "must be greater than zero",
            ));
        }
        if self.backoff.max_ms < self.backoff.base_ms {
            return Err(OrchestratorError::configuration(
                "backoff.max_ms",
                "must not be smaller than backoff.base_ms",
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(OrchestratorError::configuration(
                "backoff.multiplier",
                "must be at least 1.0",
            ));
        }
        if self.poll.max_attempts == 0 {
            return Err(OrchestratorError::configuration(
                "poll.max_attempts",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| OrchestratorError::configuration(name, format!("invalid value {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.backoff.base_ms, 1000);
        assert_eq!(config.backoff.max_ms, 60_000);
        assert!(!config.backoff.jitter_enabled);
        assert!(config.submissions_enabled);
        assert!(!config.dry_run);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_zero_tick() {
        let config = OrchestratorConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_backoff_bounds() {
        let mut config = OrchestratorConfig::default();
        config.backoff.max_ms = config.backoff.base_ms - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_document_fills_defaults() {
        let config: OrchestratorConfig =
            serde_yaml::from_str("max_concurrent_jobs: 4\nbackoff:\n  base_ms: 250\n").unwrap();
        assert_eq!(config.max_concurrent_jobs, 4);
        assert_eq!(config.backoff.base_ms, 250);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.poll.max_attempts, 30);
    }
}
