//! Managed build-service clients.
//!
//! The hosted service performs upload and store hand-off on its own
//! machines; this side starts a service job, polls it, and finalizes. Store
//! credentials are registered with the service ahead of time but still have
//! to be present locally so misconfigured environments fail fast.

use super::{
    poll_bounded, response_str, simulation, EndpointRequest, PlatformAdapter, RemoteBuildStatus,
    RemoteEndpoint, RemoteState, SubmissionTicket, UploadReceipt,
};
use crate::config::PollSettings;
use crate::credentials::{AppStoreCredentials, PlayCredentials};
use crate::error::{OrchestratorError, Result};
use crate::logging::log_adapter_operation;
use crate::model::{DeliveryMechanism, Platform, SubmissionPayload};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared machinery for both hosted adapters.
struct HostedCore {
    name: &'static str,
    platform: Platform,
    endpoint: Arc<dyn RemoteEndpoint>,
    poll: PollSettings,
    dry_run: bool,
}

impl HostedCore {
    async fn call(&self, operation: &str, params: Value) -> Result<Value> {
        log_adapter_operation(
            self.name,
            operation,
            params.get("bundle_id").and_then(Value::as_str),
            "dispatch",
            None,
        );
        self.endpoint
            .call(EndpointRequest {
                operation: format!("hosted.{operation}"),
                platform: self.platform,
                params,
            })
            .await
    }

    async fn validate(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<RemoteState> {
        if self.dry_run {
            return simulation::remote_state(payload, cancel).await;
        }
        let response = self
            .call("preflight", json!({ "bundle_id": payload.bundle_id }))
            .await?;
        Ok(RemoteState {
            latest_build_number: response.get("latest_build_number").and_then(Value::as_u64),
            live_version: None,
        })
    }

    async fn start_submission(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        if self.dry_run {
            return simulation::upload_receipt("hosted", payload, cancel).await;
        }
        let response = self
            .call(
                "start_submission",
                json!({
                    "bundle_id": payload.bundle_id,
                    "artifact_path": payload.artifact_path,
                    "version_name": payload.version_name,
                    "build_number": payload.build_number,
                }),
            )
            .await?;
        Ok(UploadReceipt {
            upload_id: response_str(&response, "start_submission", "service_job_id")?,
            uploaded_at: chrono::Utc::now(),
        })
    }

    async fn poll_service_job(
        &self,
        service_job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteBuildStatus> {
        if self.dry_run {
            return simulation::processed_status(cancel).await;
        }
        poll_bounded("service_job", &self.poll, cancel, |_| {
            let service_job_id = service_job_id.to_string();
            async move {
                let response = self
                    .call("job_status", json!({ "service_job_id": service_job_id }))
                    .await?;
                let state = response_str(&response, "job_status", "state")?;
                Ok(match state.as_str() {
                    "queued" | "in_progress" => RemoteBuildStatus::Processing,
                    "finished" => RemoteBuildStatus::Processed,
                    other => RemoteBuildStatus::Failed {
                        reason: format!("service job entered state {other}"),
                    },
                })
            }
        })
        .await
    }

    async fn simple(
        &self,
        operation: &'static str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.dry_run {
            return simulation::ack(operation, cancel).await;
        }
        self.call(operation, params).await?;
        Ok(())
    }

    async fn finalize(
        &self,
        prefix: &str,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<SubmissionTicket> {
        if self.dry_run {
            return simulation::ticket(prefix, payload, cancel).await;
        }
        let response = self
            .call("finalize", json!({ "bundle_id": payload.bundle_id }))
            .await?;
        Ok(SubmissionTicket {
            submission_id: response_str(&response, "finalize", "submission_id")?,
            review_state: response_str(&response, "finalize", "review_state")?,
        })
    }
}

macro_rules! hosted_adapter {
    ($adapter:ident, $credentials:ty, $platform:expr, $name:literal, $prefix:literal, $missing:literal) => {
        pub struct $adapter {
            credentials: Option<Arc<$credentials>>,
            core: HostedCore,
        }

        impl $adapter {
            pub fn new(
                credentials: Option<Arc<$credentials>>,
                endpoint: Arc<dyn RemoteEndpoint>,
                poll: PollSettings,
                dry_run: bool,
            ) -> Self {
                Self {
                    credentials,
                    core: HostedCore {
                        name: $name,
                        platform: $platform,
                        endpoint,
                        poll,
                        dry_run,
                    },
                }
            }

            fn check_credentials(&self) -> Result<()> {
                if self.core.dry_run || self.credentials.is_some() {
                    Ok(())
                } else {
                    Err(OrchestratorError::configuration($name, $missing))
                }
            }
        }

        #[async_trait]
        impl PlatformAdapter for $adapter {
            fn platform(&self) -> Platform {
                $platform
            }

            fn mechanism(&self) -> DeliveryMechanism {
                DeliveryMechanism::BuildService
            }

            fn name(&self) -> &'static str {
                $name
            }

            async fn validate_submission(
                &self,
                payload: &SubmissionPayload,
                cancel: &CancellationToken,
            ) -> Result<RemoteState> {
                self.check_credentials()?;
                self.core.validate(payload, cancel).await
            }

            async fn upload_build(
                &self,
                payload: &SubmissionPayload,
                cancel: &CancellationToken,
            ) -> Result<UploadReceipt> {
                self.check_credentials()?;
                self.core.start_submission(payload, cancel).await
            }

            async fn poll_build_status(
                &self,
                upload_id: &str,
                cancel: &CancellationToken,
            ) -> Result<RemoteBuildStatus> {
                self.check_credentials()?;
                self.core.poll_service_job(upload_id, cancel).await
            }

            async fn assign_track(
                &self,
                payload: &SubmissionPayload,
                track: &str,
                cancel: &CancellationToken,
            ) -> Result<()> {
                self.check_credentials()?;
                self.core
                    .simple(
                        "set_track",
                        json!({ "bundle_id": payload.bundle_id, "track": track }),
                        cancel,
                    )
                    .await
            }

            async fn commit_submission(
                &self,
                payload: &SubmissionPayload,
                cancel: &CancellationToken,
            ) -> Result<SubmissionTicket> {
                self.check_credentials()?;
                self.core.finalize($prefix, payload, cancel).await
            }

            async fn expand_rollout(
                &self,
                payload: &SubmissionPayload,
                fraction: f64,
                cancel: &CancellationToken,
            ) -> Result<()> {
                self.check_credentials()?;
                self.core
                    .simple(
                        "expand_rollout",
                        json!({ "bundle_id": payload.bundle_id, "fraction": fraction }),
                        cancel,
                    )
                    .await
            }

            async fn halt_rollout(
                &self,
                payload: &SubmissionPayload,
                cancel: &CancellationToken,
            ) -> Result<()> {
                self.check_credentials()?;
                self.core
                    .simple(
                        "halt_rollout",
                        json!({ "bundle_id": payload.bundle_id }),
                        cancel,
                    )
                    .await
            }

            async fn rollback_release(
                &self,
                payload: &SubmissionPayload,
                cancel: &CancellationToken,
            ) -> Result<()> {
                self.check_credentials()?;
                self.core
                    .simple(
                        "rollback_release",
                        json!({ "bundle_id": payload.bundle_id }),
                        cancel,
                    )
                    .await
            }
        }
    };
}

hosted_adapter!(
    HostedSubmitIosAdapter,
    AppStoreCredentials,
    Platform::Ios,
    "hosted_submit_ios",
    "hosted-ios",
    "App Store Connect credentials are not registered for the hosted service"
);

hosted_adapter!(
    HostedSubmitAndroidAdapter,
    PlayCredentials,
    Platform::Android,
    "hosted_submit_android",
    "hosted-android",
    "Play service-account credentials are not registered for the hosted service"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::UnconfiguredEndpoint;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            bundle_id: "com.example.app".to_string(),
            version_name: "3.1.0".to_string(),
            build_number: 77,
            artifact_path: Some("/builds/app.ipa".to_string()),
            track: None,
            rollout_fraction: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_dry_run_skips_credential_check() {
        let adapter = HostedSubmitIosAdapter::new(
            None,
            Arc::new(UnconfiguredEndpoint),
            PollSettings::default(),
            true,
        );
        let cancel = CancellationToken::new();
        let receipt = adapter.upload_build(&payload(), &cancel).await.unwrap();
        assert!(receipt.upload_id.starts_with("dry-run-hosted-"));
    }

    #[tokio::test]
    async fn test_live_mode_requires_registered_credentials() {
        let adapter = HostedSubmitAndroidAdapter::new(
            None,
            Arc::new(UnconfiguredEndpoint),
            PollSettings::default(),
            false,
        );
        let cancel = CancellationToken::new();
        let err = adapter
            .halt_rollout(&payload(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }
}
