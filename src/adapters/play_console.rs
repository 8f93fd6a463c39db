//! Direct-API client for Google Play submissions.
//!
//! Play submissions run inside an edit session: upload, track assignment,
//! and rollout changes accumulate against an edit that the commit step
//! publishes atomically.

use super::{
    poll_bounded, response_str, simulation, EndpointRequest, PlatformAdapter, RemoteBuildStatus,
    RemoteEndpoint, RemoteState, SubmissionTicket, UploadReceipt,
};
use crate::config::PollSettings;
use crate::credentials::PlayCredentials;
use crate::error::{OrchestratorError, Result};
use crate::logging::log_adapter_operation;
use crate::model::{DeliveryMechanism, Platform, SubmissionPayload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct PlayConsoleAdapter {
    credentials: Option<Arc<PlayCredentials>>,
    endpoint: Arc<dyn RemoteEndpoint>,
    poll: PollSettings,
    dry_run: bool,
}

impl PlayConsoleAdapter {
    pub fn new(
        credentials: Option<Arc<PlayCredentials>>,
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

    fn require_credentials(&self) -> Result<&PlayCredentials> {
        self.credentials.as_deref().ok_or_else(|| {
            OrchestratorError::configuration(
                "play_console",
                "Play service-account credentials are not configured",
            )
        })
    }

    async fn call(&self, operation: &str, params: Value) -> Result<Value> {
        let credentials = self.require_credentials()?;
        log_adapter_operation(
            self.name(),
            operation,
            params.get("package_name").and_then(Value::as_str),
            "dispatch",
            Some(&format!("service_account={}", credentials.client_email())),
        );
        self.endpoint
            .call(EndpointRequest {
                operation: operation.to_string(),
                platform: Platform::Android,
                params,
            })
            .await
    }
}

#[async_trait]
impl PlatformAdapter for PlayConsoleAdapter {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn mechanism(&self) -> DeliveryMechanism {
        DeliveryMechanism::DirectApi
    }

    fn name(&self) -> &'static str {
        "play_console"
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
            .call("app_details", json!({ "package_name": payload.bundle_id }))
            .await?;
        Ok(RemoteState {
            latest_build_number: response.get("latest_version_code").and_then(Value::as_u64),
            live_version: response
                .get("live_version_name")
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
            return simulation::upload_receipt("play", payload, cancel).await;
        }
        let artifact = payload.artifact_path.as_deref().ok_or_else(|| {
            OrchestratorError::Validation {
                field: "artifact_path".to_string(),
                reason: "an .aab artifact is required for upload".to_string(),
            }
        })?;
        let response = self
            .call(
                "upload_bundle",
                json!({
                    "package_name": payload.bundle_id,
                    "artifact_path": artifact,
                    "version_code": payload.build_number,
                }),
            )
            .await?;
        Ok(UploadReceipt {
            upload_id: response_str(&response, "upload_bundle", "edit_id")?,
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
        poll_bounded("bundle_processing", &self.poll, cancel, |_| {
            let upload_id = upload_id.to_string();
            async move {
                let response = self
                    .call("bundle_status", json!({ "edit_id": upload_id }))
                    .await?;
                let state = response_str(&response, "bundle_status", "state")?;
                Ok(match state.as_str() {
                    "processing" => RemoteBuildStatus::Processing,
                    "ready" => RemoteBuildStatus::Processed,
                    other => RemoteBuildStatus::Failed {
                        reason: format!("bundle entered state {other}"),
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
        self.call(
            "assign_track",
            json!({
                "package_name": payload.bundle_id,
                "version_code": payload.build_number,
                "track": track,
                "user_fraction": payload.rollout_fraction,
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
            return simulation::ticket("play", payload, cancel).await;
        }
        let response = self
            .call("commit_edit", json!({ "package_name": payload.bundle_id }))
            .await?;
        Ok(SubmissionTicket {
            submission_id: response_str(&response, "commit_edit", "edit_id")?,
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
        self.call(
            "update_rollout",
            json!({
                "package_name": payload.bundle_id,
                "user_fraction": fraction,
            }),
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
            "halt_rollout",
            json!({ "package_name": payload.bundle_id }),
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
            "rollback_release",
            json!({
                "package_name": payload.bundle_id,
                "version_code": payload.build_number,
            }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::UnconfiguredEndpoint;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            bundle_id: "com.example.app".to_string(),
            version_name: "2.0.1".to_string(),
            build_number: 210,
            artifact_path: Some("/builds/app.aab".to_string()),
            track: Some("production".to_string()),
            rollout_fraction: Some(0.1),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_dry_run_completes_every_capability() {
        let adapter = PlayConsoleAdapter::new(
            None,
            Arc::new(UnconfiguredEndpoint),
            PollSettings::default(),
            true,
        );
        let cancel = CancellationToken::new();
        let payload = payload();

        adapter.validate_submission(&payload, &cancel).await.unwrap();
        let receipt = adapter.upload_build(&payload, &cancel).await.unwrap();
        adapter
            .poll_build_status(&receipt.upload_id, &cancel)
            .await
            .unwrap();
        adapter
            .assign_track(&payload, "production", &cancel)
            .await
            .unwrap();
        let ticket = adapter.commit_submission(&payload, &cancel).await.unwrap();
        assert!(ticket.submission_id.starts_with("dry-run-play-"));
        adapter.expand_rollout(&payload, 0.5, &cancel).await.unwrap();
        adapter.halt_rollout(&payload, &cancel).await.unwrap();
        adapter.rollback_release(&payload, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_live_mode_without_credentials_fails() {
        let adapter = PlayConsoleAdapter::new(
            None,
            Arc::new(UnconfiguredEndpoint),
            PollSettings::default(),
            false,
        );
        let cancel = CancellationToken::new();
        let err = adapter
            .validate_submission(&payload(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }
}
