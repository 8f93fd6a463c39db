//! # Submission Service
//!
//! The outermost composition point. Wires configuration, credentials, the
//! adapter registry, the status reporter, the queue, and the worker together
//! once, and exposes the surface external callers (CLI or API layer)
//! consume. No component below this one reaches for process-wide state.

use crate::adapters::{AdapterRegistry, RemoteEndpoint, UnconfiguredEndpoint};
use crate::assets::AssetCollaborator;
use crate::config::OrchestratorConfig;
use crate::credentials::CredentialsProvider;
use crate::error::{OrchestratorError, Result};
use crate::events::{EventPublisher, PublishedProgress};
use crate::model::{Job, JobId, JobRequest, Platform};
use crate::queue::JobQueue;
use crate::reporter::{JobStatistics, JobSummary, StatusReporter};
use crate::validation::{self, ReleaseMetadata, ValidationResult};
use crate::worker::{SubmissionWorker, WorkerStatistics};
use crate::model::DeliveryMechanism;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct SubmissionService {
    config: OrchestratorConfig,
    credentials: CredentialsProvider,
    registry: Arc<AdapterRegistry>,
    reporter: Arc<StatusReporter>,
    queue: Arc<JobQueue>,
    worker: SubmissionWorker,
    publisher: EventPublisher,
}

impl SubmissionService {
    /// Compose the service without a remote transport; only dry-run jobs can
    /// complete successfully.
    pub fn new(config: OrchestratorConfig, credentials: CredentialsProvider) -> Self {
        Self::with_endpoint(config, credentials, Arc::new(UnconfiguredEndpoint))
    }

    /// Compose the service around a wired remote transport.
    pub fn with_endpoint(
        config: OrchestratorConfig,
        credentials: CredentialsProvider,
        endpoint: Arc<dyn RemoteEndpoint>,
    ) -> Self {
        let publisher = EventPublisher::default();
        let reporter = Arc::new(StatusReporter::new(publisher.clone()));
        let queue = Arc::new(JobQueue::new());
        let registry = Arc::new(AdapterRegistry::new(
            &credentials,
            config.poll.clone(),
            endpoint,
        ));
        let worker = SubmissionWorker::new(
            queue.clone(),
            reporter.clone(),
            registry.clone(),
            &config,
        );
        Self {
            config,
            credentials,
            registry,
            reporter,
            queue,
            worker,
            publisher,
        }
    }

    /// Compose from environment configuration and credentials.
    pub fn from_env() -> Result<Self> {
        let config = OrchestratorConfig::from_env()?;
        let credentials =
            CredentialsProvider::from_env(config.dry_run, config.submissions_enabled)?;
        Ok(Self::new(config, credentials))
    }

    /// Install the asset preparation collaborator consulted before uploads.
    pub fn set_asset_collaborator(&self, collaborator: Arc<dyn AssetCollaborator>) {
        self.worker.set_asset_collaborator(collaborator);
    }

    /// Start the scheduling loop.
    pub fn start(&self) {
        self.worker.start(self.config.tick_interval());
    }

    /// Stop the scheduler and cancel in-flight jobs.
    pub async fn shutdown(&self) {
        self.worker.stop().await;
    }

    /// Submit a job for asynchronous execution. Returns immediately with
    /// the job id.
    pub fn submit_job(&self, mut request: JobRequest) -> Result<JobId> {
        if !self.credentials.submissions_enabled() {
            return Err(OrchestratorError::configuration(
                "submissions",
                "submissions are disabled by configuration",
            ));
        }
        // The process-wide dry-run flag wins over the per-job option so the
        // recorded job reflects what actually ran.
        request.dry_run = request.dry_run || self.config.dry_run;
        let id = self.worker.submit_job(request);
        // Retention runs opportunistically on submission, so the job map
        // stays bounded without a separate sweeper.
        self.reporter.cleanup_old_jobs(self.config.retention_keep);
        Ok(id)
    }

    pub fn cancel_job(&self, id: JobId) -> Result<()> {
        self.worker.cancel_job(id)
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.reporter.get_job(id)
    }

    /// All known jobs, most recently created first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.reporter.list_jobs()
    }

    pub fn get_summary(&self, id: JobId) -> Option<JobSummary> {
        self.reporter.get_summary(id)
    }

    /// Job counts by status.
    pub fn get_statistics(&self) -> JobStatistics {
        self.reporter.get_statistics()
    }

    /// Queue and dispatch load.
    pub fn worker_statistics(&self) -> WorkerStatistics {
        self.worker.statistics()
    }

    /// Synchronous document validation; no job is involved.
    pub fn validate_metadata(&self, document: &ReleaseMetadata) -> ValidationResult {
        validation::validate_metadata(document)
    }

    /// Composite preflight gate, run inline rather than as a queued job.
    /// For `Platform::Both` the per-platform results are AND-merged.
    pub async fn run_preflight(
        &self,
        document: &ReleaseMetadata,
        platform: Platform,
        dry_run: bool,
    ) -> Result<ValidationResult> {
        let dry_run = dry_run || self.config.dry_run;
        let mut result = ValidationResult::ok();
        for &single in platform.singles() {
            let adapter = self
                .registry
                .resolve(single, DeliveryMechanism::DirectApi, dry_run)?;
            result.merge(validation::run_preflight(adapter.as_ref(), document, dry_run).await);
        }
        Ok(result)
    }

    /// Subscribe to the live progress stream.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<PublishedProgress> {
        self.publisher.subscribe()
    }

    /// Apply the retention policy, keeping the configured number of most
    /// recent jobs.
    pub fn cleanup_old_jobs(&self) -> usize {
        self.reporter.cleanup_old_jobs(self.config.retention_keep)
    }

    /// Pending jobs currently queued (not yet dispatched).
    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }
}
