//! # Platform Adapters
//!
//! ## Architecture: Capability Abstraction over Store Platforms
//!
//! Every way of reaching a store platform implements the same capability
//! set: validate, upload, poll processing status, assign a track, commit for
//! review, and control rollouts. One concrete adapter exists per
//! (platform × delivery mechanism) pair, selected through the
//! [`AdapterRegistry`] factory.
//!
//! ## Contract
//!
//! - Every capability honors dry-run mode: no remote effects, deterministic
//!   placeholder results after a short simulated delay, and no credential
//!   requirement.
//! - Outside dry-run, a capability invoked without configured credentials
//!   fails with a configuration error.
//! - Polling is bounded: a fixed attempt budget with a fixed inter-attempt
//!   delay, failing with a timeout error once exhausted. The cancellation
//!   signal is checked before every attempt.
//!
//! Real transport is not modeled here; non-dry-run effects go through the
//! [`RemoteEndpoint`] seam injected at construction.

pub mod app_store;
pub mod fastlane;
pub mod hosted;
pub mod play_console;
pub mod registry;
pub mod simulation;

pub use app_store::AppStoreConnectAdapter;
pub use fastlane::{FastlaneAndroidAdapter, FastlaneIosAdapter};
pub use hosted::{HostedSubmitAndroidAdapter, HostedSubmitIosAdapter};
pub use play_console::PlayConsoleAdapter;
pub use registry::AdapterRegistry;

use crate::config::PollSettings;
use crate::error::{OrchestratorError, Result};
use crate::model::{DeliveryMechanism, Platform, SubmissionPayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Last known remote state for a bundle, resolved during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteState {
    /// Highest build number the store has seen, when known.
    pub latest_build_number: Option<u64>,
    /// Currently live marketing version, when known.
    pub live_version: Option<String>,
}

/// Receipt for an accepted build upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub upload_id: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Terminal outcome of remote build processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBuildStatus {
    /// Still processing. Internal to polling loops; never returned from
    /// [`PlatformAdapter::poll_build_status`].
    Processing,
    Processed,
    Failed { reason: String },
}

/// Identifier of a committed submission awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionTicket {
    pub submission_id: String,
    pub review_state: String,
}

/// The fixed capability set every platform/mechanism pair implements.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;
    fn mechanism(&self) -> DeliveryMechanism;
    fn name(&self) -> &'static str;

    /// Validate that the store will accept this submission, returning the
    /// last known remote state for version-monotonicity checks.
    async fn validate_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<RemoteState>;

    /// Upload the signed artifact.
    async fn upload_build(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt>;

    /// Wait for remote processing of an uploaded build to finish. Bounded;
    /// returns the terminal status or a timeout error.
    async fn poll_build_status(
        &self,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteBuildStatus>;

    /// Attach the processed build to a release track.
    async fn assign_track(
        &self,
        payload: &SubmissionPayload,
        track: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Commit the release for store review.
    async fn commit_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<SubmissionTicket>;

    /// Raise the staged-rollout fraction of a live release.
    async fn expand_rollout(
        &self,
        payload: &SubmissionPayload,
        fraction: f64,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Pause a staged rollout.
    async fn halt_rollout(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Return users to the previously shipped release.
    async fn rollback_release(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// One remote invocation crossing the transport boundary. Target context
/// (bundle id, upload id, track) travels in `params`.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub operation: String,
    pub platform: Platform,
    pub params: Value,
}

/// Boundary for real remote effects.
///
/// Adapters build requests and interpret responses; how a request reaches
/// the store (HTTP client, spawned CLI process, service SDK) is wired by the
/// host process. Tests substitute a mock.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn call(&self, request: EndpointRequest) -> Result<Value>;
}

/// Endpoint used when no transport has been wired. Every call fails with a
/// configuration error, which keeps dry-run the only viable mode.
pub struct UnconfiguredEndpoint;

#[async_trait]
impl RemoteEndpoint for UnconfiguredEndpoint {
    async fn call(&self, request: EndpointRequest) -> Result<Value> {
        Err(OrchestratorError::configuration(
            "remote_endpoint",
            format!("no transport configured for operation {}", request.operation),
        ))
    }
}

/// Run a bounded polling loop: at most `poll.max_attempts` attempts with a
/// fixed delay between them, checking the cancellation signal before each.
pub(crate) async fn poll_bounded<F, Fut>(
    operation: &str,
    poll: &PollSettings,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<RemoteBuildStatus>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<RemoteBuildStatus>>,
{
    for n in 1..=poll.max_attempts {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled {
                operation: operation.to_string(),
            });
        }
        match attempt(n).await? {
            RemoteBuildStatus::Processing => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(OrchestratorError::Cancelled {
                            operation: operation.to_string(),
                        });
                    }
                    _ = tokio::time::sleep(poll.interval()) => {}
                }
            }
            terminal => return Ok(terminal),
        }
    }
    Err(OrchestratorError::Timeout {
        operation: operation.to_string(),
        attempts: poll.max_attempts,
    })
}

/// Pull a required string field out of an endpoint response.
pub(crate) fn response_str(value: &Value, operation: &str, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            OrchestratorError::transient(
                operation,
                format!("malformed response: missing field {field:?}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_settings(max_attempts: u32) -> PollSettings {
        PollSettings {
            max_attempts,
            interval_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_poll_bounded_returns_terminal_status() {
        let cancel = CancellationToken::new();
        let result = poll_bounded("test", &poll_settings(5), &cancel, |n| async move {
            if n < 3 {
                Ok(RemoteBuildStatus::Processing)
            } else {
                Ok(RemoteBuildStatus::Processed)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, RemoteBuildStatus::Processed);
    }

    #[tokio::test]
    async fn test_poll_bounded_times_out() {
        let cancel = CancellationToken::new();
        let err = poll_bounded("build_status", &poll_settings(3), &cancel, |_| async {
            Ok(RemoteBuildStatus::Processing)
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Timeout { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_poll_bounded_observes_cancellation_before_attempt() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = AtomicU32::new(0);
        let err = poll_bounded("build_status", &poll_settings(3), &cancel, |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(RemoteBuildStatus::Processing) }
        })
        .await
        .unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_response_str_flags_malformed_response() {
        let value = serde_json::json!({"other": 1});
        let err = response_str(&value, "upload", "upload_id").unwrap_err();
        assert!(err.is_retryable());
    }
}
