//! # Submission Worker
//!
//! ## Architecture: Tick-Driven Dispatch with Cooperative Cancellation
//!
//! The worker owns the queue-to-terminal-state lifecycle. A periodic
//! scheduler tick dequeues the highest-priority eligible job, executes its
//! platform step sequence through the resolved adapter, and records progress
//! and the terminal result in the status reporter.
//!
//! ## Key Properties
//!
//! - **Bounded dispatch**: a semaphore caps concurrent jobs (default one at
//!   a time); jobs targeting the same bundle identifier never overlap.
//! - **At most one attempt in flight per job**: a job re-enters the queue
//!   only after its current attempt has fully resolved.
//! - **Cooperative cancellation**: every attempt gets a child token of the
//!   worker's shutdown token; adapters observe it at each suspension point.
//! - **Retry with backoff**: retryable failures re-enqueue after
//!   `base * 2^retry_count`, until the retry budget is exhausted.

use crate::adapters::{AdapterRegistry, PlatformAdapter, RemoteBuildStatus, SubmissionTicket};
use crate::assets::AssetCollaborator;
use crate::config::OrchestratorConfig;
use crate::constants::progress;
use crate::error::{ErrorDisposition, OrchestratorError, Result};
use crate::model::{Job, JobId, JobRequest, JobStatus};
use crate::queue::JobQueue;
use crate::reporter::{LogLevel, StatusReporter};
use crate::worker::backoff::RetryPolicy;
use crate::worker::steps::{resolve_steps, scale_percentage, StepAction, SubmissionStep};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Snapshot of worker load for callers polling health.
#[derive(Debug, Clone)]
pub struct WorkerStatistics {
    pub queue_length: usize,
    pub active_jobs: usize,
    pub running: bool,
}

struct ActiveEntry {
    token: CancellationToken,
    bundle_id: String,
}

struct WorkerInner {
    queue: Arc<JobQueue>,
    reporter: Arc<StatusReporter>,
    adapters: Arc<AdapterRegistry>,
    retry_policy: RetryPolicy,
    dispatch_semaphore: Arc<Semaphore>,
    active: DashMap<JobId, ActiveEntry>,
    attempt_handles: Mutex<HashMap<JobId, JoinHandle<()>>>,
    assets: Mutex<Option<Arc<dyn AssetCollaborator>>>,
    shutdown: Mutex<CancellationToken>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

/// Drives jobs from the queue to a terminal state.
#[derive(Clone)]
pub struct SubmissionWorker {
    inner: Arc<WorkerInner>,
}

impl SubmissionWorker {
    pub fn new(
        queue: Arc<JobQueue>,
        reporter: Arc<StatusReporter>,
        adapters: Arc<AdapterRegistry>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                queue,
                reporter,
                adapters,
                retry_policy: RetryPolicy::new(config.backoff.clone()),
                dispatch_semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                active: DashMap::new(),
                attempt_handles: Mutex::new(HashMap::new()),
                assets: Mutex::new(None),
                shutdown: Mutex::new(CancellationToken::new()),
                scheduler: Mutex::new(None),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Install the asset preparation collaborator consulted before uploads.
    pub fn set_asset_collaborator(&self, collaborator: Arc<dyn AssetCollaborator>) {
        *self.inner.assets.lock() = Some(collaborator);
    }

    /// Enqueue a new job and register it with the reporter. Non-blocking;
    /// dispatch happens on a later scheduler tick.
    pub fn submit_job(&self, request: JobRequest) -> JobId {
        let job = Job::new(request);
        let id = job.id;
        info!(
            job_id = %id,
            job_type = %job.job_type,
            platform = %job.platform,
            priority = job.priority,
            dry_run = job.dry_run,
            "Job submitted"
        );
        self.inner.reporter.create_job(job.clone());
        self.inner.queue.enqueue(job);
        id
    }

    /// Cancel a job.
    ///
    /// A queued job is removed without dispatch; a running job is signalled
    /// and marked cancelled once the signal is observed; a terminal job is a
    /// no-op.
    pub fn cancel_job(&self, id: JobId) -> Result<()> {
        if let Some(entry) = self.inner.active.get(&id) {
            debug!(job_id = %id, "Signalling cancellation to in-flight attempt");
            entry.token.cancel();
            return Ok(());
        }

        if self.inner.queue.remove(id).is_some() {
            debug!(job_id = %id, "Cancelled queued job before dispatch");
            return self
                .inner
                .reporter
                .set_result(id, JobStatus::Cancelled, None, None);
        }

        match self.inner.reporter.get_job(id) {
            // Terminal already, or an attempt is just finishing: no-op.
            Some(job) if job.status.is_terminal() || job.status.is_active() => Ok(()),
            // Queued in the reporter but not in the queue: parked for a
            // delayed retry. Mark it cancelled; the re-enqueue task checks
            // status before putting it back.
            Some(_) => self
                .inner
                .reporter
                .set_result(id, JobStatus::Cancelled, None, None),
            None => Err(OrchestratorError::JobNotFound { job_id: id }),
        }
    }

    /// Start the periodic scheduling loop.
    pub fn start(&self, tick_interval: Duration) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Worker already running, ignoring start");
            return;
        }
        let token = CancellationToken::new();
        *self.inner.shutdown.lock() = token.clone();

        info!(tick_ms = tick_interval.as_millis() as u64, "🚀 Submission worker started");
        let worker = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => worker.tick(),
                }
            }
            debug!("Scheduler loop exited");
        });
        *self.inner.scheduler.lock() = Some(handle);
    }

    /// Stop the scheduler and cancel every in-flight job.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping submission worker");
        self.inner.shutdown.lock().cancel();

        let scheduler = self.inner.scheduler.lock().take();
        if let Some(handle) = scheduler {
            let _ = handle.await;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.inner.attempt_handles.lock();
            guard.drain().map(|(_, handle)| handle).collect()
        };
        futures::future::join_all(handles).await;
        info!("Submission worker stopped");
    }

    pub fn statistics(&self) -> WorkerStatistics {
        WorkerStatistics {
            queue_length: self.inner.queue.len(),
            active_jobs: self.inner.active.len(),
            running: self.inner.running.load(Ordering::SeqCst),
        }
    }

    /// One scheduler pass: dispatch eligible jobs while permits last.
    fn tick(&self) {
        self.inner
            .attempt_handles
            .lock()
            .retain(|_, handle| !handle.is_finished());

        loop {
            let Ok(permit) = self.inner.dispatch_semaphore.clone().try_acquire_owned() else {
                return;
            };
            // Jobs aimed at a bundle with an attempt in flight stay queued,
            // so conflicting submissions never run concurrently.
            let busy: HashSet<String> = self
                .inner
                .active
                .iter()
                .map(|entry| entry.bundle_id.clone())
                .collect();
            let Some(job) = self
                .inner
                .queue
                .dequeue_matching(|j| !busy.contains(&j.payload.bundle_id))
            else {
                return;
            };
            self.dispatch(job, permit);
        }
    }

    fn dispatch(&self, job: Job, permit: OwnedSemaphorePermit) {
        let id = job.id;
        let token = self.inner.shutdown.lock().child_token();
        self.inner.active.insert(
            id,
            ActiveEntry {
                token: token.clone(),
                bundle_id: job.payload.bundle_id.clone(),
            },
        );

        let worker = self.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            worker.run_attempt(job, &token).await;
            worker.inner.active.remove(&id);
        });
        self.inner.attempt_handles.lock().insert(id, handle);
    }

    /// Execute one dispatch attempt to its resolution.
    #[instrument(skip(self, job, token), fields(job_id = %job.id, job_type = %job.job_type))]
    async fn run_attempt(&self, job: Job, token: &CancellationToken) {
        let id = job.id;
        let reporter = &self.inner.reporter;
        let attempt = job.retry_count + 1;

        if let Err(e) = reporter.update_status(id, JobStatus::Running) {
            // Lost a race with cancellation between dequeue and dispatch.
            debug!(job_id = %id, error = %e, "Skipping attempt, job no longer startable");
            return;
        }
        let _ = reporter.mark_started(id, Utc::now());
        let _ = reporter.add_progress(
            id,
            progress::JOB_STARTED,
            format!("Attempt {attempt} started"),
            if attempt == 1 { Some(1) } else { None },
            Some(json!({ "attempt": attempt })),
        );

        match self.execute_steps(&job, token).await {
            Ok(result) => {
                info!(job_id = %id, attempt, "Job completed");
                let _ = reporter.set_result(id, JobStatus::Succeeded, Some(result), None);
            }
            Err(error) => self.resolve_failure(&job, error, token),
        }
    }

    /// Run the platform step sequences for a job.
    async fn execute_steps(&self, job: &Job, token: &CancellationToken) -> Result<Value> {
        let platforms = job.platform.singles();
        let steps = resolve_steps(job.job_type);
        let mut results = serde_json::Map::new();
        for (index, &platform) in platforms.iter().enumerate() {
            let adapter = self
                .inner
                .adapters
                .resolve(platform, job.mechanism, job.dry_run)?;
            let outcome = self
                .run_platform_sequence(job, adapter.as_ref(), steps, index, platforms.len(), token)
                .await?;
            results.insert(platform.to_string(), outcome);
        }
        Ok(Value::Object(results))
    }

    async fn run_platform_sequence(
        &self,
        job: &Job,
        adapter: &dyn PlatformAdapter,
        steps: &[SubmissionStep],
        platform_index: usize,
        platform_count: usize,
        token: &CancellationToken,
    ) -> Result<Value> {
        let id = job.id;
        let reporter = &self.inner.reporter;
        let mut upload_id: Option<String> = None;
        let mut ticket: Option<SubmissionTicket> = None;

        for step in steps {
            if token.is_cancelled() {
                return Err(OrchestratorError::Cancelled {
                    operation: step_label(step.action).to_string(),
                });
            }

            if let Some((code, pct)) = step.start {
                reporter.add_progress(
                    id,
                    code,
                    step_message(code),
                    Some(scale_percentage(platform_index, platform_count, pct)),
                    None,
                )?;
            }

            // External confirmation polling is the only blocking wait; the
            // job reports the waiting sub-state while it runs.
            if step.action == StepAction::AwaitProcessing {
                let _ = reporter.update_status(id, JobStatus::Waiting);
            }
            let step_data = self
                .run_action(job, adapter, step.action, &mut upload_id, &mut ticket, token)
                .await;
            if step.action == StepAction::AwaitProcessing {
                let _ = reporter.update_status(id, JobStatus::Running);
            }
            let step_data = step_data?;

            let (code, pct) = step.complete;
            reporter.add_progress(
                id,
                code,
                step_message(code),
                Some(scale_percentage(platform_index, platform_count, pct)),
                step_data,
            )?;
        }

        Ok(json!({
            "adapter": adapter.name(),
            "upload_id": upload_id,
            "submission_id": ticket.as_ref().map(|t| t.submission_id.clone()),
            "review_state": ticket.as_ref().map(|t| t.review_state.clone()),
        }))
    }

    async fn run_action(
        &self,
        job: &Job,
        adapter: &dyn PlatformAdapter,
        action: StepAction,
        upload_id: &mut Option<String>,
        ticket: &mut Option<SubmissionTicket>,
        token: &CancellationToken,
    ) -> Result<Option<Value>> {
        let payload = &job.payload;
        match action {
            StepAction::Validate => {
                let state = adapter.validate_submission(payload, token).await?;
                Ok(Some(json!({
                    "latest_remote_build": state.latest_build_number,
                    "live_version": state.live_version,
                })))
            }
            StepAction::Upload => {
                self.check_assets(payload)?;
                let receipt = adapter.upload_build(payload, token).await?;
                let data = json!({ "upload_id": receipt.upload_id });
                *upload_id = Some(receipt.upload_id);
                Ok(Some(data))
            }
            StepAction::AwaitProcessing => {
                let reference = upload_id.clone().ok_or_else(|| {
                    OrchestratorError::InvalidState {
                        operation: "await_processing".to_string(),
                        reason: "no upload receipt from the previous step".to_string(),
                    }
                })?;
                match adapter.poll_build_status(&reference, token).await? {
                    RemoteBuildStatus::Processed => Ok(None),
                    RemoteBuildStatus::Failed { reason } => Err(OrchestratorError::transient(
                        "build_processing",
                        reason,
                    )),
                    RemoteBuildStatus::Processing => Err(OrchestratorError::transient(
                        "build_processing",
                        "adapter returned a non-terminal processing status",
                    )),
                }
            }
            StepAction::AssignTrack => {
                let track = payload.track_or_default();
                adapter.assign_track(payload, track, token).await?;
                Ok(Some(json!({ "track": track })))
            }
            StepAction::Commit => {
                let committed = adapter.commit_submission(payload, token).await?;
                let data = json!({
                    "submission_id": committed.submission_id,
                    "review_state": committed.review_state,
                });
                *ticket = Some(committed);
                Ok(Some(data))
            }
            StepAction::ConfirmReview => Ok(ticket.as_ref().map(|t| {
                json!({
                    "submission_id": t.submission_id,
                    "review_state": t.review_state,
                })
            })),
            StepAction::ExpandRollout => {
                let fraction = payload.rollout_fraction.ok_or_else(|| {
                    OrchestratorError::Validation {
                        field: "rollout_fraction".to_string(),
                        reason: "rollout expansion requires a target fraction".to_string(),
                    }
                })?;
                adapter.expand_rollout(payload, fraction, token).await?;
                Ok(Some(json!({ "fraction": fraction })))
            }
            StepAction::HaltRollout => {
                adapter.halt_rollout(payload, token).await?;
                Ok(None)
            }
            StepAction::Rollback => {
                adapter.rollback_release(payload, token).await?;
                Ok(None)
            }
        }
    }

    /// Run the asset collaborator over the build artifact, when one is
    /// installed. A negative report fails the job without retrying.
    fn check_assets(&self, payload: &crate::model::SubmissionPayload) -> Result<()> {
        let collaborator = self.inner.assets.lock().clone();
        let (Some(collaborator), Some(artifact)) = (collaborator, payload.artifact_path.as_deref())
        else {
            return Ok(());
        };
        let artifact = std::path::Path::new(artifact);
        let staging = artifact.parent().unwrap_or_else(|| std::path::Path::new("."));
        let report = collaborator.prepare_assets(staging, &[artifact.to_path_buf()]);
        if report.ok {
            Ok(())
        } else {
            Err(OrchestratorError::Validation {
                field: "artifact_path".to_string(),
                reason: format!("asset preparation failed: {}", report.errors.join("; ")),
            })
        }
    }

    /// Classify a failed attempt and either re-enqueue with backoff or
    /// settle the job.
    ///
    /// A cancellation signal raised during the attempt wins over the error's
    /// own classification, so a job cancelled mid-failure settles as
    /// cancelled rather than being retried.
    fn resolve_failure(&self, job: &Job, error: OrchestratorError, token: &CancellationToken) {
        let id = job.id;
        let reporter = &self.inner.reporter;

        let disposition = if token.is_cancelled() {
            ErrorDisposition::Cancel
        } else {
            ErrorDisposition::classify(&error)
        };
        match disposition {
            ErrorDisposition::Cancel => {
                info!(job_id = %id, "Job cancelled");
                let _ = reporter.set_result(id, JobStatus::Cancelled, None, None);
            }
            ErrorDisposition::Permanent => {
                warn!(job_id = %id, error = %error, "Job failed permanently");
                let _ = reporter.add_log(id, LogLevel::Error, error.to_string());
                let _ = reporter.set_result(id, JobStatus::Failed, None, Some(error.to_string()));
            }
            ErrorDisposition::Retry => match reporter.increment_retry(id) {
                Ok(retry_count) => {
                    let delay = self.inner.retry_policy.delay_for(retry_count);
                    warn!(
                        job_id = %id,
                        retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Attempt failed, retry scheduled"
                    );
                    let _ = reporter.add_log(
                        id,
                        LogLevel::Warn,
                        format!("attempt failed, will retry: {error}"),
                    );
                    let _ = reporter.update_status(id, JobStatus::Queued);
                    let _ = reporter.add_progress(
                        id,
                        progress::JOB_RETRY_SCHEDULED,
                        format!(
                            "Retry {retry_count} of {} scheduled in {}ms",
                            job.max_retries,
                            delay.as_millis()
                        ),
                        None,
                        Some(json!({
                            "retry_count": retry_count,
                            "delay_ms": delay.as_millis() as u64,
                        })),
                    );
                    self.schedule_requeue(id, delay);
                }
                Err(_) => {
                    warn!(job_id = %id, error = %error, "Retry budget exhausted, job failed");
                    let _ = reporter.add_log(id, LogLevel::Error, error.to_string());
                    let _ =
                        reporter.set_result(id, JobStatus::Failed, None, Some(error.to_string()));
                }
            },
        }
    }

    /// Put a job back in the queue after its backoff delay, unless it was
    /// cancelled or the worker shut down in the meantime.
    fn schedule_requeue(&self, id: JobId, delay: Duration) {
        let worker = self.clone();
        let shutdown = self.inner.shutdown.lock().clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match worker.inner.reporter.get_job(id) {
                Some(job) if job.status == JobStatus::Queued => {
                    debug!(job_id = %id, retry_count = job.retry_count, "Re-enqueueing for retry");
                    worker.inner.queue.enqueue(job);
                }
                _ => debug!(job_id = %id, "Skipping re-enqueue, job no longer queued"),
            }
        });
    }
}

fn step_label(action: StepAction) -> &'static str {
    match action {
        StepAction::Validate => "validate_submission",
        StepAction::Upload => "upload_build",
        StepAction::AwaitProcessing => "build_processing",
        StepAction::AssignTrack => "assign_track",
        StepAction::Commit => "commit_submission",
        StepAction::ConfirmReview => "confirm_review",
        StepAction::ExpandRollout => "expand_rollout",
        StepAction::HaltRollout => "halt_rollout",
        StepAction::Rollback => "rollback_release",
    }
}

fn step_message(code: &str) -> &'static str {
    match code {
        progress::VALIDATION_START => "Validating submission",
        progress::VALIDATION_COMPLETE => "Submission validated",
        progress::UPLOAD_START => "Uploading build artifact",
        progress::UPLOAD_COMPLETE => "Build artifact uploaded",
        progress::BUILD_PROCESSING => "Waiting for remote build processing",
        progress::BUILD_PROCESSED => "Remote build processing finished",
        progress::TRACK_ASSIGNED => "Build assigned to release track",
        progress::VERSION_SUBMITTED => "Version submitted for review",
        progress::REVIEW_PENDING => "Review pending",
        progress::ROLLOUT_EXPANDED => "Staged rollout expanded",
        progress::ROLLOUT_HALTED => "Staged rollout halted",
        progress::ROLLBACK_COMPLETE => "Rolled back to previous release",
        _ => "Progress",
    }
}
