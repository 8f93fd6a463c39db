//! Shared harness for integration tests: a scriptable mock adapter and a
//! directly wired worker stack.
#![allow(dead_code)] // Not every test binary uses every helper.

use async_trait::async_trait;
use shipway_core::adapters::{
    AdapterRegistry, PlatformAdapter, RemoteBuildStatus, RemoteState, SubmissionTicket,
    UploadReceipt,
};
use shipway_core::config::{OrchestratorConfig, PollSettings};
use shipway_core::credentials::CredentialsProvider;
use shipway_core::error::{OrchestratorError, Result};
use shipway_core::events::EventPublisher;
use shipway_core::model::{DeliveryMechanism, Platform, SubmissionPayload};
use shipway_core::queue::JobQueue;
use shipway_core::reporter::StatusReporter;
use shipway_core::worker::SubmissionWorker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Adapter double with scriptable failures and call accounting.
#[derive(Default)]
pub struct MockAdapter {
    /// Total capability calls observed.
    pub calls: AtomicUsize,
    /// Fail this many validate calls with a transient error before
    /// succeeding.
    pub fail_validate_times: AtomicUsize,
    /// Last known remote build number reported by validation.
    pub remote_build: Option<u64>,
    /// Park upload calls on the cancellation token instead of returning.
    pub block_uploads: bool,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_validation(times: usize) -> Self {
        Self {
            fail_validate_times: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn blocking_uploads() -> Self {
        Self {
            block_uploads: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn mechanism(&self) -> DeliveryMechanism {
        DeliveryMechanism::DirectApi
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn validate_submission(
        &self,
        payload: &SubmissionPayload,
        _cancel: &CancellationToken,
    ) -> Result<RemoteState> {
        self.record();
        let remaining = self.fail_validate_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_validate_times
                .store(remaining - 1, Ordering::SeqCst);
            return Err(OrchestratorError::transient(
                "validate_submission",
                "injected transient failure",
            ));
        }
        Ok(RemoteState {
            latest_build_number: self.remote_build.or(Some(payload.build_number - 1)),
            live_version: None,
        })
    }

    async fn upload_build(
        &self,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt> {
        self.record();
        if self.block_uploads {
            cancel.cancelled().await;
            return Err(OrchestratorError::Cancelled {
                operation: "upload_build".to_string(),
            });
        }
        Ok(UploadReceipt {
            upload_id: format!("mock-upload-{}", payload.build_number),
            uploaded_at: chrono::Utc::now(),
        })
    }

    async fn poll_build_status(
        &self,
        _upload_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<RemoteBuildStatus> {
        self.record();
        Ok(RemoteBuildStatus::Processed)
    }

    async fn assign_track(
        &self,
        _payload: &SubmissionPayload,
        _track: &str,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record();
        Ok(())
    }

    async fn commit_submission(
        &self,
        payload: &SubmissionPayload,
        _cancel: &CancellationToken,
    ) -> Result<SubmissionTicket> {
        self.record();
        Ok(SubmissionTicket {
            submission_id: format!("mock-submission-{}", payload.build_number),
            review_state: "WAITING_FOR_REVIEW".to_string(),
        })
    }

    async fn expand_rollout(
        &self,
        _payload: &SubmissionPayload,
        _fraction: f64,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record();
        Ok(())
    }

    async fn halt_rollout(
        &self,
        _payload: &SubmissionPayload,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record();
        Ok(())
    }

    async fn rollback_release(
        &self,
        _payload: &SubmissionPayload,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.record();
        Ok(())
    }
}

/// A worker stack wired around a mock adapter.
pub struct Harness {
    pub queue: Arc<JobQueue>,
    pub reporter: Arc<StatusReporter>,
    pub worker: SubmissionWorker,
    pub adapter: Arc<MockAdapter>,
}

/// Build a harness with fast scheduling and backoff so retry scenarios run
/// in milliseconds.
pub fn harness(adapter: MockAdapter) -> Harness {
    let mut config = OrchestratorConfig::default();
    config.tick_interval_ms = 10;
    config.backoff.base_ms = 10;
    config.backoff.max_ms = 500;
    // Two permits so per-bundle serialization is observable on its own,
    // independent of the dispatch bound.
    config.max_concurrent_jobs = 2;

    let adapter = Arc::new(adapter);
    let credentials = CredentialsProvider::unconfigured(false, true);
    let mut registry = AdapterRegistry::unconfigured(&credentials, PollSettings::default());
    registry.register(Platform::Ios, DeliveryMechanism::DirectApi, adapter.clone());

    let reporter = Arc::new(StatusReporter::new(EventPublisher::default()));
    let queue = Arc::new(JobQueue::new());
    let worker = SubmissionWorker::new(
        queue.clone(),
        reporter.clone(),
        Arc::new(registry),
        &config,
    );

    Harness {
        queue,
        reporter,
        worker,
        adapter,
    }
}

pub fn payload() -> SubmissionPayload {
    SubmissionPayload {
        bundle_id: "com.example.app".to_string(),
        version_name: "1.0.0".to_string(),
        build_number: 10,
        artifact_path: Some("/builds/app.ipa".to_string()),
        track: Some("beta".to_string()),
        rollout_fraction: None,
        metadata: None,
    }
}

/// Poll until `condition` holds or the timeout elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
