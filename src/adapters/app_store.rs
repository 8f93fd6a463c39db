//! # App Store Connect Adapter
//!
//! Direct-API client for iOS submissions. Builds App Store Connect requests
//! and interprets responses; the signed transport itself lives behind the
//! [`RemoteEndpoint`] seam.
//!
//! Upload processing on App Store Connect is asynchronous: after an upload
//! is accepted the build disappears into processing for minutes before it
//! becomes attachable to a version, so [`poll_build_status`] carries most of
//! the waiting.
//!
//! [`poll_build_status`]: PlatformAdapter::poll_build_status

use super::{
    poll_bounded, response_str, simulation, EndpointRequest, PlatformAdapter, RemoteBuildStatus,
    RemoteEndpoint, RemoteState, SubmissionTicket, UploadReceipt,
};
use crate::config::PollSettings;
use crate::credentials::AppStoreCredentials;
use crate::error::{OrchestratorError, Result};
use crate::logging::log_adapter_operation;
use crate::model::{DeliveryMechanism, Platform, SubmissionPayload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppStoreConnectAdapter {
    credentials: Option<Arc<AppStoreCredentials>>,
    endpoint: Arc<dyn RemoteEndpoint>,
    poll: PollSettings,
    dry_run: bool,
}

impl AppStoreConnectAdapter {
    pub fn new(
        credentials: Option<Arc<AppStoreCredentials>>,
        endpoint: Arc<dyn RemoteEndpoint>,
        poll: PollSettings,
        dry_run: bool,
    ) -> Self {
        Self {
            credentials,
            endpoint,
            poll,
            dry_run,
        }
    }

    fn require_credentials(&self) -> Result<&AppStoreCredentials> {
        self.credentials.as_deref().ok_or_else(|| {
            OrchestratorError::configuration(
                "app_store_connect",
                "App Store Connect credentials are not configured",
            )
        })
    }

    /// Issue one authenticated API call through the endpoint seam.
    async fn call(&self, operation: &str, params: Value) -> Result<Value> {
        let credentials = self.require_credentials()?;
        log_adapter_operation(
            self.name(),
            operation,
            params.get("bundle_id").and_then(Value::as_str),
            "dispatch",
            Some(&format!("key_id={}", credentials.key_id)),
        );
        self.endpoint
            .call(EndpointRequest {
                operation: operation.to_string(),
                platform: Platform::Ios,
                params,
            })
            .await
    }
}

#[async_trait]
impl PlatformAdapter for AppStoreConnectAdapter {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn mechanism(&self) -> DeliveryMechanism {
        DeliveryMechanism::DirectApi
    }

    fn name(&self) -> &'static str {
        "app_store_connect"
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
            .call("lookup_app", json!({ "bundle_id": payload.bundle_id }))
            .await?;
        Ok(RemoteState {
            latest_build_number: response.get("latest_build_number").and_then(Value::as_u64),
            live_version: response
                .get("live_version")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn upload_build(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        if self.dry_run {
            return simulation::upload_receipt("asc", payload, cancel).await;
        }
        let artifact = payload.artifact_path.as_deref().ok_or_else(|| {
            OrchestratorError::Validation {
                field: "artifact_path".to_string(),
                reason: "an .ipa artifact is required for upload".to_string(),
            }
        })?;
        let response = self
            .call(
                "upload_build",
                json!({
                    "bundle_id": payload.bundle_id,
                    "artifact_path": artifact,
                    "version_name": payload.version_name,
                    "build_number": payload.build_number,
                }),
            )
            .await?;
        Ok(UploadReceipt {
            upload_id: response_str(&response, "upload_build", "upload_id")?,
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
        poll_bounded("build_status", &self.poll, cancel, |_| {
            let upload_id = upload_id.to_string();
            async move {
                let response = self
                    .call("build_status", json!({ "upload_id": upload_id }))
                    .await?;
                let state = response_str(&response, "build_status", "state")?;
                Ok(match state.as_str() {
                    "PROCESSING" => RemoteBuildStatus::Processing,
                    "VALID" => RemoteBuildStatus::Processed,
                    other => RemoteBuildStatus::Failed {
                        reason: format!("build entered state {other}"),
                    },
                })
            }
        })
        .await
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
        // Non-production tracks map to TestFlight groups on this platform.
        self.call(
            "assign_release_group",
            json!({
                "bundle_id": payload.bundle_id,
                "build_number": payload.build_number,
                "group": track,
            }),
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
            return simulation::ticket("asc", payload, cancel).await;
        }
        let response = self
            .call(
                "submit_for_review",
                json!({
                    "bundle_id": payload.bundle_id,
                    "version_name": payload.version_name,
                    "build_number": payload.build_number,
                    "phased_release": payload.rollout_fraction.is_some(),
                }),
            )
            .await?;
        Ok(SubmissionTicket {
            submission_id: response_str(&response, "submit_for_review", "submission_id")?,
            review_state: response_str(&response, "submit_for_review", "review_state")?,
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
        self.call(
            "update_phased_release",
            json!({ "bundle_id": payload.bundle_id, "fraction": fraction }),
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
        self.call(
            "pause_phased_release",
            json!({ "bundle_id": payload.bundle_id }),
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
        self.call(
            "revert_to_previous_release",
            json!({
                "bundle_id": payload.bundle_id,
                "version_name": payload.version_name,
            }),
        )
        .await?;
        Ok(())
    }
}
