//! CLI-wrapper adapters that drive submissions through fastlane lanes.
//!
//! Each capability maps to one lane invocation crossing the
//! [`RemoteEndpoint`] seam; the spawned process itself is wired by the host.
//! Lanes block until their work is done, so processing waits happen inside
//! a single `wait_processing` invocation rather than a polling loop here.

use super::{
    response_str, simulation, EndpointRequest, PlatformAdapter, RemoteBuildStatus, RemoteEndpoint,
    RemoteState, SubmissionTicket, UploadReceipt,
};
use crate::credentials::{AppStoreCredentials, PlayCredentials};
use crate::error::{OrchestratorError, Result};
use crate::logging::log_adapter_operation;
use crate::model::{DeliveryMechanism, Platform, SubmissionPayload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn check_cancelled(operation: &str, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(OrchestratorError::Cancelled {
            operation: operation.to_string(),
        })
    } else {
        Ok(())
    }
}

async fn run_lane(
    endpoint: &dyn RemoteEndpoint,
    adapter: &'static str,
    platform: Platform,
    lane: &str,
    params: Value,
    cancel: &CancellationToken,
) -> Result<Value> {
    check_cancelled(lane, cancel)?;
    log_adapter_operation(
        adapter,
        lane,
        params.get("bundle_id").and_then(Value::as_str),
        "dispatch",
        None,
    );
    endpoint
        .call(EndpointRequest {
            operation: format!("fastlane.{lane}"),
            platform,
            params,
        })
        .await
}

/// fastlane wrapper for iOS: deliver/pilot lanes against App Store Connect.
pub struct FastlaneIosAdapter {
    credentials: Option<Arc<AppStoreCredentials>>,
    endpoint: Arc<dyn RemoteEndpoint>,
    dry_run: bool,
}

impl FastlaneIosAdapter {
    pub fn new(
        credentials: Option<Arc<AppStoreCredentials>>,
        endpoint: Arc<dyn RemoteEndpoint>,
        dry_run: bool,
    ) -> Self {
        Self {
            credentials,
            endpoint,
            dry_run,
        }
    }

    fn require_credentials(&self) -> Result<&AppStoreCredentials> {
        self.credentials.as_deref().ok_or_else(|| {
            OrchestratorError::configuration(
                "fastlane_ios",
                "App Store Connect API key is not configured for fastlane",
            )
        })
    }

    async fn lane(&self, lane: &str, params: Value, cancel: &CancellationToken) -> Result<Value> {
        self.require_credentials()?;
        run_lane(
            self.endpoint.as_ref(),
            "fastlane_ios",
            Platform::Ios,
            lane,
            params,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl PlatformAdapter for FastlaneIosAdapter {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn mechanism(&self) -> DeliveryMechanism {
        DeliveryMechanism::CliTool
    }

    fn name(&self) -> &'static str {
        "fastlane_ios"
    }

    async fn validate_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<RemoteState> {
        if self.dry_run {
            return simulation::remote_state(payload, cancel).await;
        }
        let response = self
            .lane(
                "precheck",
                json!({ "bundle_id": payload.bundle_id }),
                cancel,
            )
            .await?;
        Ok(RemoteState {
            latest_build_number: response.get("latest_build_number").and_then(Value::as_u64),
            live_version: None,
        })
    }

    async fn upload_build(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        if self.dry_run {
            return simulation::upload_receipt("fastlane-ios", payload, cancel).await;
        }
        let response = self
            .lane(
                "pilot_upload",
                json!({
                    "bundle_id": payload.bundle_id,
                    "ipa": payload.artifact_path,
                    "build_number": payload.build_number,
                }),
                cancel,
            )
            .await?;
        Ok(UploadReceipt {
            upload_id: response_str(&response, "pilot_upload", "upload_id")?,
            uploaded_at: chrono::Utc::now(),
        })
    }

    async fn poll_build_status(
        &self,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteBuildStatus> {
        if self.dry_run {
            return simulation::processed_status(cancel).await;
        }
        // pilot blocks until processing finishes, so one invocation suffices.
        let response = self
            .lane("wait_processing", json!({ "upload_id": upload_id }), cancel)
            .await?;
        match response_str(&response, "wait_processing", "state")?.as_str() {
            "processed" => Ok(RemoteBuildStatus::Processed),
            other => Ok(RemoteBuildStatus::Failed {
                reason: format!("processing ended in state {other}"),
            }),
        }
    }

    async fn assign_track(
        &self,
        payload: &SubmissionPayload,
        track: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("assign_track", cancel).await;
        }
        self.lane(
            "pilot_distribute",
            json!({ "bundle_id": payload.bundle_id, "group": track }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn commit_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<SubmissionTicket> {
        if self.dry_run {
            return simulation::ticket("fastlane-ios", payload, cancel).await;
        }
        let response = self
            .lane(
                "deliver_submit",
                json!({
                    "bundle_id": payload.bundle_id,
                    "version_name": payload.version_name,
                }),
                cancel,
            )
            .await?;
        Ok(SubmissionTicket {
            submission_id: response_str(&response, "deliver_submit", "submission_id")?,
            review_state: "WAITING_FOR_REVIEW".to_string(),
        })
    }

    async fn expand_rollout(
        &self,
        payload: &SubmissionPayload,
        fraction: f64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("expand_rollout", cancel).await;
        }
        self.lane(
            "phased_release_update",
            json!({ "bundle_id": payload.bundle_id, "fraction": fraction }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn halt_rollout(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("halt_rollout", cancel).await;
        }
        self.lane(
            "phased_release_pause",
            json!({ "bundle_id": payload.bundle_id }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn rollback_release(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("rollback_release", cancel).await;
        }
        self.lane(
            "rollback",
            json!({ "bundle_id": payload.bundle_id }),
            cancel,
        )
        .await?;
        Ok(())
    }
}

/// fastlane wrapper for Android: supply lanes against the Play Console.
pub struct FastlaneAndroidAdapter {
    credentials: Option<Arc<PlayCredentials>>,
    endpoint: Arc<dyn RemoteEndpoint>,
    dry_run: bool,
}

impl FastlaneAndroidAdapter {
    pub fn new(
        credentials: Option<Arc<PlayCredentials>>,
        endpoint: Arc<dyn RemoteEndpoint>,
        dry_run: bool,
    ) -> Self {
        Self {
            credentials,
            endpoint,
            dry_run,
        }
    }

    fn require_credentials(&self) -> Result<&PlayCredentials> {
        self.credentials.as_deref().ok_or_else(|| {
            OrchestratorError::configuration(
                "fastlane_android",
                "Play service-account key is not configured for fastlane",
            )
        })
    }

    async fn lane(&self, lane: &str, params: Value, cancel: &CancellationToken) -> Result<Value> {
        self.require_credentials()?;
        run_lane(
            self.endpoint.as_ref(),
            "fastlane_android",
            Platform::Android,
            lane,
            params,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl PlatformAdapter for FastlaneAndroidAdapter {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn mechanism(&self) -> DeliveryMechanism {
        DeliveryMechanism::CliTool
    }

    fn name(&self) -> &'static str {
        "fastlane_android"
    }

    async fn validate_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<RemoteState> {
        if self.dry_run {
            return simulation::remote_state(payload, cancel).await;
        }
        let response = self
            .lane(
                "supply_init",
                json!({ "bundle_id": payload.bundle_id }),
                cancel,
            )
            .await?;
        Ok(RemoteState {
            latest_build_number: response.get("latest_version_code").and_then(Value::as_u64),
            live_version: None,
        })
    }

    async fn upload_build(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        if self.dry_run {
            return simulation::upload_receipt("fastlane-android", payload, cancel).await;
        }
        let response = self
            .lane(
                "supply_upload",
                json!({
                    "bundle_id": payload.bundle_id,
                    "aab": payload.artifact_path,
                    "version_code": payload.build_number,
                }),
                cancel,
            )
            .await?;
        Ok(UploadReceipt {
            upload_id: response_str(&response, "supply_upload", "upload_id")?,
            uploaded_at: chrono::Utc::now(),
        })
    }

    async fn poll_build_status(
        &self,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteBuildStatus> {
        if self.dry_run {
            return simulation::processed_status(cancel).await;
        }
        let response = self
            .lane("wait_processing", json!({ "upload_id": upload_id }), cancel)
            .await?;
        match response_str(&response, "wait_processing", "state")?.as_str() {
            "processed" => Ok(RemoteBuildStatus::Processed),
            other => Ok(RemoteBuildStatus::Failed {
                reason: format!("processing ended in state {other}"),
            }),
        }
    }

    async fn assign_track(
        &self,
        payload: &SubmissionPayload,
        track: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("assign_track", cancel).await;
        }
        self.lane(
            "supply_track",
            json!({
                "bundle_id": payload.bundle_id,
                "track": track,
                "user_fraction": payload.rollout_fraction,
            }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn commit_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<SubmissionTicket> {
        if self.dry_run {
            return simulation::ticket("fastlane-android", payload, cancel).await;
        }
        let response = self
            .lane(
                "supply_commit",
                json!({ "bundle_id": payload.bundle_id }),
                cancel,
            )
            .await?;
        Ok(SubmissionTicket {
            submission_id: response_str(&response, "supply_commit", "edit_id")?,
            review_state: "IN_REVIEW".to_string(),
        })
    }

    async fn expand_rollout(
        &self,
        payload: &SubmissionPayload,
        fraction: f64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("expand_rollout", cancel).await;
        }
        self.lane(
            "supply_rollout",
            json!({ "bundle_id": payload.bundle_id, "user_fraction": fraction }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn halt_rollout(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("halt_rollout", cancel).await;
        }
        self.lane(
            "supply_halt",
            json!({ "bundle_id": payload.bundle_id }),
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn rollback_release(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack("rollback_release", cancel).await;
        }
        self.lane(
            "supply_rollback",
            json!({ "bundle_id": payload.bundle_id }),
            cancel,
        )
        .await?;
        Ok(())
    }
}
