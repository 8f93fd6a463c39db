//! Dry-run simulation helpers shared by every adapter.
//!
//! Results are deterministic functions of the payload so repeated dry runs
//! of the same submission produce identical placeholder identifiers.

use super::{RemoteBuildStatus, RemoteState, SubmissionTicket, UploadReceipt};
use crate::error::{OrchestratorError, Result};
use crate::model::SubmissionPayload;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Short pause standing in for a remote round trip.
pub const SIMULATED_DELAY: Duration = Duration::from_millis(25);

/// Number of simulated processing polls before a build reports processed.
const SIMULATED_PROCESSING_POLLS: u32 = 2;

async fn round_trip(operation: &str, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(OrchestratorError::Cancelled {
            operation: operation.to_string(),
        }),
        _ = tokio::time::sleep(SIMULATED_DELAY) => Ok(()),
    }
}

pub async fn remote_state(
    payload: &SubmissionPayload,
    cancel: &CancellationToken,
) -> Result<RemoteState> {
    round_trip("validate_submission", cancel).await?;
    Ok(RemoteState {
        latest_build_number: Some(payload.build_number.saturating_sub(1)),
        live_version: None,
    })
}

pub async fn upload_receipt(
    prefix: &str,
    payload: &SubmissionPayload,
    cancel: &CancellationToken,
) -> Result<UploadReceipt> {
    round_trip("upload_build", cancel).await?;
    Ok(UploadReceipt {
        upload_id: format!(
            "dry-run-{prefix}-{}-{}",
            payload.bundle_id, payload.build_number
        ),
        uploaded_at: chrono::Utc::now(),
    })
}

/// Simulated processing: reports processing for a couple of polls, then
/// processed. Observes the cancellation signal between polls.
pub async fn processed_status(
    cancel: &CancellationToken,
) -> Result<RemoteBuildStatus> {
    for _ in 0..SIMULATED_PROCESSING_POLLS {
        round_trip("poll_build_status", cancel).await?;
    }
    Ok(RemoteBuildStatus::Processed)
}

pub async fn ticket(
    prefix: &str,
    payload: &SubmissionPayload,
    cancel: &CancellationToken,
) -> Result<SubmissionTicket> {
    round_trip("commit_submission", cancel).await?;
    Ok(SubmissionTicket {
        submission_id: format!(
            "dry-run-{prefix}-submission-{}-{}",
            payload.bundle_id, payload.build_number
        ),
        review_state: "WAITING_FOR_REVIEW".to_string(),
    })
}

/// Simulated acknowledgement for capabilities with no interesting result.
pub async fn ack(operation: &str, cancel: &CancellationToken) -> Result<()> {
    round_trip(operation, cancel).await
}
