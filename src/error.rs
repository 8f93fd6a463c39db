//! # Error Types
//!
//! Structured error handling for the submission orchestrator.
//!
//! Every failure that can surface from a job attempt is classified into a
//! disposition that tells the worker what to do next: fail the job, retry it
//! with backoff, or mark it cancelled. Errors that fall outside the core
//! taxonomy are treated as retryable so recoverable failures are never
//! silently dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// Bad input shape or content. Surfaced immediately, never retried.
    #[error("Validation error for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Missing or invalid credentials or configuration. Terminal for the
    /// current attempt.
    #[error("Configuration error for {config_source}: {reason}")]
    Configuration {
        config_source: String,
        reason: String,
    },

    /// Network, remote-processing, or other transient remote failure.
    /// Retried per the backoff policy.
    #[error("Transient remote error during {operation}: {reason}")]
    TransientRemote { operation: String, reason: String },

    /// The job's cancellation signal was observed. Distinct from failure,
    /// never retried.
    #[error("Operation cancelled during {operation}")]
    Cancelled { operation: String },

    /// Bounded polling exhausted its attempt budget. The attempt fails
    /// deterministically; the job is retried like a transient failure.
    #[error("Timed out during {operation} after {attempts} polling attempts")]
    Timeout { operation: String, attempts: u32 },

    /// No job with the given identifier is known to the reporter.
    #[error("Job {job_id} not found")]
    JobNotFound { job_id: Uuid },

    /// An operation was attempted against a job in an incompatible state.
    #[error("Invalid state for {operation}: {reason}")]
    InvalidState { operation: String, reason: String },

    /// Payload or result serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(error: serde_json::Error) -> Self {
        OrchestratorError::Serialization(error.to_string())
    }
}

pub type Result<T> = anyhow::Result<T, OrchestratorError>;

/// What the worker should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDisposition {
    /// Fail the job without retrying.
    Permanent,
    /// Retry with backoff while the retry budget lasts.
    Retry,
    /// Mark the job cancelled.
    Cancel,
}

impl ErrorDisposition {
    /// Classify an error into a disposition.
    ///
    /// Errors outside the core taxonomy default to retry semantics; a warning
    /// is logged when classification falls through to that default.
    pub fn classify(error: &OrchestratorError) -> Self {
        match error {
            OrchestratorError::Validation { .. } | OrchestratorError::Configuration { .. } => {
                ErrorDisposition::Permanent
            }
            OrchestratorError::TransientRemote { .. } | OrchestratorError::Timeout { .. } => {
                ErrorDisposition::Retry
            }
            OrchestratorError::Cancelled { .. } => ErrorDisposition::Cancel,
            other => {
                warn!(
                    error = %other,
                    "Unclassified error from job attempt, defaulting to retry disposition"
                );
                ErrorDisposition::Retry
            }
        }
    }
}

impl OrchestratorError {
    /// Whether this error should be retried at the job level.
    pub fn is_retryable(&self) -> bool {
        ErrorDisposition::classify(self) == ErrorDisposition::Retry
    }

    /// Whether this error represents an observed cancellation signal.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled { .. })
    }

    /// Shorthand constructor for transient remote failures.
    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        OrchestratorError::TransientRemote {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand constructor for configuration failures.
    pub fn configuration(config_source: impl Into<String>, reason: impl Into<String>) -> Self {
        OrchestratorError::Configuration {
            config_source: config_source.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_permanent() {
        let err = OrchestratorError::Validation {
            field: "contact_email".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(ErrorDisposition::classify(&err), ErrorDisposition::Permanent);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_and_timeout_are_retryable() {
        let transient = OrchestratorError::transient("upload", "connection reset");
        let timeout = OrchestratorError::Timeout {
            operation: "build_processing".to_string(),
            attempts: 30,
        };
        assert!(transient.is_retryable());
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_cancellation_is_distinct_from_failure() {
        let err = OrchestratorError::Cancelled {
            operation: "upload".to_string(),
        };
        assert_eq!(ErrorDisposition::classify(&err), ErrorDisposition::Cancel);
        assert!(err.is_cancellation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unclassified_defaults_to_retry() {
        let err = OrchestratorError::Serialization("bad payload".to_string());
        assert_eq!(ErrorDisposition::classify(&err), ErrorDisposition::Retry);
    }

    #[test]
    fn test_display_formatting() {
        let err = OrchestratorError::configuration("app_store", "missing key id");
        assert_eq!(
            err.to_string(),
            "Configuration error for app_store: missing key id"
        );
    }
}
