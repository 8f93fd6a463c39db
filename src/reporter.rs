//! # Status Reporter
//!
//! The single source of truth for job state visible to external callers
//! while the worker drives transitions.
//!
//! ## Overview
//!
//! The reporter owns the per-job record: current status, the append-only
//! progress event sequence, captured log lines, and the terminal result.
//! State lives behind the [`JobStore`] trait so the in-memory backend can be
//! replaced by a durable one without touching the worker.
//!
//! Two guarantees matter here and are guarded explicitly:
//! - a terminal result is never lost once set; re-setting is ignored with a
//!   warning
//! - every terminal transition appends exactly one terminal progress event

use crate::constants::progress;
use crate::error::{OrchestratorError, Result};
use crate::events::{EventPublisher, PublishedProgress};
use crate::model::{Job, JobId, JobStatus, JobType, Platform};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// One milestone in a job's progress history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stable symbolic code, see [`crate::constants::progress`].
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Overall completion in percent. Non-decreasing within a job's
    /// lifetime; the reporter clamps to the high-water mark so retries never
    /// regress the reported figure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Severity of a captured log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A log line captured against a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the reporter knows about one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: Job,
    pub progress: Vec<ProgressEvent>,
    pub logs: Vec<LogEntry>,
}

impl JobRecord {
    fn new(job: Job) -> Self {
        Self {
            job,
            progress: Vec::new(),
            logs: Vec::new(),
        }
    }

    fn percentage_high_water(&self) -> u8 {
        self.progress
            .iter()
            .filter_map(|e| e.percentage)
            .max()
            .unwrap_or(0)
    }
}

/// Storage seam for job records.
///
/// The reference backend is in-memory; a durable backend can be substituted
/// without changing the worker's logic.
pub trait JobStore: Send + Sync {
    fn insert(&self, record: JobRecord);
    fn get(&self, id: JobId) -> Option<JobRecord>;
    /// Apply a mutation to the record under the store's own serialization.
    /// Returns false when the job is unknown.
    fn update(&self, id: JobId, apply: &mut dyn FnMut(&mut JobRecord)) -> bool;
    fn remove(&self, id: JobId) -> bool;
    fn list(&self) -> Vec<JobRecord>;
    fn len(&self) -> usize;
}

/// Default in-memory backend.
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, record: JobRecord) {
        self.jobs.insert(record.job.id, record);
    }

    fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(&id).map(|r| r.clone())
    }

    fn update(&self, id: JobId, apply: &mut dyn FnMut(&mut JobRecord)) -> bool {
        match self.jobs.get_mut(&id) {
            Some(mut record) => {
                apply(&mut record);
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: JobId) -> bool {
        self.jobs.remove(&id).is_some()
    }

    fn list(&self) -> Vec<JobRecord> {
        self.jobs.iter().map(|r| r.clone()).collect()
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}

/// Derived per-job view for polling callers.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub job_type: JobType,
    pub platform: Platform,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub retry_count: u32,
    pub error_count: usize,
    pub warning_count: usize,
    pub latest_message: Option<String>,
}

/// Counts of jobs by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStatistics {
    pub queued: usize,
    pub running: usize,
    pub waiting: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

/// Authoritative in-memory record of job lifecycle, progress, and logs.
pub struct StatusReporter {
    store: Arc<dyn JobStore>,
    publisher: EventPublisher,
}

impl StatusReporter {
    pub fn new(publisher: EventPublisher) -> Self {
        Self::with_store(Arc::new(InMemoryJobStore::new()), publisher)
    }

    /// Construct against an alternative storage backend.
    pub fn with_store(store: Arc<dyn JobStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Register a newly created job.
    pub fn create_job(&self, job: Job) {
        debug!(job_id = %job.id, job_type = %job.job_type, "Registering job");
        self.store.insert(JobRecord::new(job));
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.store.get(id).map(|r| r.job)
    }

    pub fn get_record(&self, id: JobId) -> Option<JobRecord> {
        self.store.get(id)
    }

    /// Transition a job's status, enforcing the state machine.
    pub fn update_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let mut outcome = Err(OrchestratorError::JobNotFound { job_id: id });
        self.store.update(id, &mut |record| {
            let current = record.job.status;
            if current == status {
                outcome = Ok(());
                return;
            }
            if current.can_transition_to(status) {
                record.job.status = status;
                outcome = Ok(());
            } else {
                outcome = Err(OrchestratorError::InvalidState {
                    operation: "update_status".to_string(),
                    reason: format!("cannot transition from {current} to {status}"),
                });
            }
        });
        outcome
    }

    /// Record the start of a dispatch attempt. The job's start timestamp is
    /// only set on the first attempt.
    pub fn mark_started(&self, id: JobId, at: DateTime<Utc>) -> Result<()> {
        if self.store.update(id, &mut |record| record.job.mark_started(at)) {
            Ok(())
        } else {
            Err(OrchestratorError::JobNotFound { job_id: id })
        }
    }

    /// Increment a job's retry counter. Fails when the budget is exhausted.
    pub fn increment_retry(&self, id: JobId) -> Result<u32> {
        let mut outcome = Err(OrchestratorError::JobNotFound { job_id: id });
        self.store.update(id, &mut |record| {
            outcome = match record.job.increment_retry() {
                Some(count) => Ok(count),
                None => Err(OrchestratorError::InvalidState {
                    operation: "increment_retry".to_string(),
                    reason: format!(
                        "retry budget of {} exhausted for job {id}",
                        record.job.max_retries
                    ),
                }),
            };
        });
        outcome
    }

    /// Append a progress event and publish it to live subscribers.
    ///
    /// Percentages are clamped to the job's high-water mark so the reported
    /// figure never decreases across retries.
    pub fn add_progress(
        &self,
        id: JobId,
        code: &str,
        message: impl Into<String>,
        percentage: Option<u8>,
        data: Option<Value>,
    ) -> Result<()> {
        let message = message.into();
        let mut found = false;
        let mut published: Option<PublishedProgress> = None;
        self.store.update(id, &mut |record| {
            found = true;
            let effective = percentage.map(|p| {
                let high_water = record.percentage_high_water();
                p.min(100).max(high_water)
            });
            let event = ProgressEvent {
                code: code.to_string(),
                message: message.clone(),
                timestamp: Utc::now(),
                percentage: effective,
                data: data.clone(),
            };
            published = Some(PublishedProgress {
                job_id: id,
                code: event.code.clone(),
                message: event.message.clone(),
                percentage: event.percentage,
                data: event.data.clone(),
                published_at: event.timestamp,
            });
            record.progress.push(event);
        });
        if !found {
            return Err(OrchestratorError::JobNotFound { job_id: id });
        }
        if let Some(event) = published {
            self.publisher.publish(event);
        }
        Ok(())
    }

    /// Capture a log line against a job.
    pub fn add_log(&self, id: JobId, level: LogLevel, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.store.update(id, &mut |record| {
            record.logs.push(LogEntry {
                level,
                message: message.clone(),
                timestamp: Utc::now(),
            });
        }) {
            Ok(())
        } else {
            Err(OrchestratorError::JobNotFound { job_id: id })
        }
    }

    /// Idempotently transition a job to a terminal status, record its result
    /// or error, and append the matching terminal progress event.
    ///
    /// Re-setting a result on an already-terminal job is a logic error in the
    /// caller; it is ignored with a warning so the first result survives.
    pub fn set_result(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(OrchestratorError::InvalidState {
                operation: "set_result".to_string(),
                reason: format!("{status} is not a terminal status"),
            });
        }

        let mut found = false;
        let mut already_terminal = false;
        self.store.update(id, &mut |record| {
            found = true;
            if record.job.status.is_terminal() {
                already_terminal = true;
                return;
            }
            record.job.status = status;
            record.job.completed_at = Some(Utc::now());
            record.job.result = result.clone();
            record.job.error = error.clone();
        });

        if !found {
            return Err(OrchestratorError::JobNotFound { job_id: id });
        }
        if already_terminal {
            warn!(job_id = %id, attempted = %status, "Result already set, ignoring re-set");
            return Ok(());
        }

        let (code, message, percentage) = match status {
            JobStatus::Succeeded => (
                progress::JOB_COMPLETED,
                "Job completed".to_string(),
                Some(100),
            ),
            JobStatus::Failed => (
                progress::JOB_FAILED,
                error.clone().unwrap_or_else(|| "Job failed".to_string()),
                None,
            ),
            JobStatus::Cancelled => (progress::JOB_CANCELLED, "Job cancelled".to_string(), None),
            _ => unreachable!("guarded above"),
        };
        self.add_progress(id, code, message, percentage, None)
    }

    /// Cancel a job that is still queued, running, or waiting.
    pub fn cancel_job(&self, id: JobId) -> Result<()> {
        let job = self
            .get_job(id)
            .ok_or(OrchestratorError::JobNotFound { job_id: id })?;
        if !job.status.is_cancellable() {
            return Err(OrchestratorError::InvalidState {
                operation: "cancel_job".to_string(),
                reason: format!("job is {}", job.status),
            });
        }
        self.set_result(id, JobStatus::Cancelled, None, None)
    }

    /// Derived summary for one job.
    pub fn get_summary(&self, id: JobId) -> Option<JobSummary> {
        let record = self.store.get(id)?;
        let error_count = record
            .logs
            .iter()
            .filter(|l| l.level == LogLevel::Error)
            .count();
        let warning_count = record
            .logs
            .iter()
            .filter(|l| l.level == LogLevel::Warn)
            .count();
        Some(JobSummary {
            job_id: record.job.id,
            job_type: record.job.job_type,
            platform: record.job.platform,
            status: record.job.status,
            created_at: record.job.created_at,
            started_at: record.job.started_at,
            completed_at: record.job.completed_at,
            duration_ms: record.job.duration_ms(),
            retry_count: record.job.retry_count,
            error_count,
            warning_count,
            latest_message: record.progress.last().map(|e| e.message.clone()),
        })
    }

    /// All known jobs, most recently created first.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.store.list().into_iter().map(|r| r.job).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Counts of jobs by status.
    pub fn get_statistics(&self) -> JobStatistics {
        let mut stats = JobStatistics::default();
        for record in self.store.list() {
            stats.total += 1;
            match record.job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Waiting => stats.waiting += 1,
                JobStatus::Succeeded => stats.succeeded += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Evict old terminal jobs, keeping the `keep` most recently created
    /// jobs. Non-terminal jobs are never evicted. Returns the eviction count.
    pub fn cleanup_old_jobs(&self, keep: usize) -> usize {
        let mut records = self.store.list();
        records.sort_by(|a, b| b.job.created_at.cmp(&a.job.created_at));
        let mut evicted = 0;
        for record in records.into_iter().skip(keep) {
            if record.job.status.is_terminal() && self.store.remove(record.job.id) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, keep, "Evicted old jobs");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobRequest, SubmissionPayload};

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            bundle_id: "com.example.app".to_string(),
            version_name: "1.0.0".to_string(),
            build_number: 7,
            artifact_path: None,
            track: None,
            rollout_fraction: None,
            metadata: None,
        }
    }

    fn reporter_with_job() -> (StatusReporter, JobId) {
        let reporter = StatusReporter::new(EventPublisher::default());
        let job = Job::new(JobRequest::new(JobType::Submit, Platform::Ios, payload()));
        let id = job.id;
        reporter.create_job(job);
        (reporter, id)
    }

    #[test]
    fn test_status_transitions_are_guarded() {
        let (reporter, id) = reporter_with_job();
        reporter.update_status(id, JobStatus::Running).unwrap();
        reporter.update_status(id, JobStatus::Waiting).unwrap();
        // Waiting back to queued is allowed (retry), queued to waiting is not.
        reporter.update_status(id, JobStatus::Queued).unwrap();
        assert!(reporter.update_status(id, JobStatus::Waiting).is_err());
    }

    #[test]
    fn test_progress_percentage_never_decreases() {
        let (reporter, id) = reporter_with_job();
        reporter
            .add_progress(id, "UPLOAD_COMPLETE", "uploaded", Some(40), None)
            .unwrap();
        // A later event with a lower figure is clamped to the high-water mark.
        reporter
            .add_progress(id, "VALIDATION_START", "retrying", Some(5), None)
            .unwrap();
        let record = reporter.get_record(id).unwrap();
        assert_eq!(record.progress[1].percentage, Some(40));
    }

    #[test]
    fn test_set_result_appends_exactly_one_terminal_event() {
        let (reporter, id) = reporter_with_job();
        reporter.update_status(id, JobStatus::Running).unwrap();
        reporter
            .set_result(id, JobStatus::Succeeded, Some(serde_json::json!({"ok": true})), None)
            .unwrap();
        // Second call is ignored and does not clobber the first result.
        reporter
            .set_result(id, JobStatus::Failed, None, Some("late failure".to_string()))
            .unwrap();

        let record = reporter.get_record(id).unwrap();
        assert_eq!(record.job.status, JobStatus::Succeeded);
        assert!(record.job.error.is_none());
        let terminal: Vec<_> = record
            .progress
            .iter()
            .filter(|e| {
                e.code == progress::JOB_COMPLETED
                    || e.code == progress::JOB_FAILED
                    || e.code == progress::JOB_CANCELLED
            })
            .collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].code, progress::JOB_COMPLETED);
    }

    #[test]
    fn test_set_result_rejects_non_terminal_status() {
        let (reporter, id) = reporter_with_job();
        assert!(reporter
            .set_result(id, JobStatus::Running, None, None)
            .is_err());
    }

    #[test]
    fn test_cancel_only_from_cancellable_states() {
        let (reporter, id) = reporter_with_job();
        reporter.cancel_job(id).unwrap();
        assert_eq!(reporter.get_job(id).unwrap().status, JobStatus::Cancelled);
        // Already terminal.
        assert!(reporter.cancel_job(id).is_err());
    }

    #[test]
    fn test_list_jobs_most_recent_first() {
        let reporter = StatusReporter::new(EventPublisher::default());
        let mut ids = Vec::new();
        for _ in 0..3 {
            let job = Job::new(JobRequest::new(JobType::Submit, Platform::Ios, payload()));
            ids.push(job.id);
            reporter.create_job(job);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let listed: Vec<JobId> = reporter.list_jobs().iter().map(|j| j.id).collect();
        let mut expected = ids.clone();
        expected.reverse();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_statistics_count_by_status() {
        let (reporter, id) = reporter_with_job();
        let other = Job::new(JobRequest::new(JobType::Rollback, Platform::Android, payload()));
        reporter.create_job(other);
        reporter.update_status(id, JobStatus::Running).unwrap();

        let stats = reporter.get_statistics();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.queued, 1);
    }

    #[test]
    fn test_cleanup_keeps_recent_and_non_terminal() {
        let reporter = StatusReporter::new(EventPublisher::default());
        let mut ids = Vec::new();
        for _ in 0..4 {
            let job = Job::new(JobRequest::new(JobType::Submit, Platform::Ios, payload()));
            ids.push(job.id);
            reporter.create_job(job);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        // Oldest two are terminal; next is running; newest stays queued.
        reporter.update_status(ids[0], JobStatus::Running).unwrap();
        reporter.set_result(ids[0], JobStatus::Succeeded, None, None).unwrap();
        reporter.update_status(ids[1], JobStatus::Running).unwrap();
        reporter
            .set_result(ids[1], JobStatus::Failed, None, Some("boom".to_string()))
            .unwrap();
        reporter.update_status(ids[2], JobStatus::Running).unwrap();

        let evicted = reporter.cleanup_old_jobs(1);
        assert_eq!(evicted, 2);
        // Running job survives even though it fell outside the keep window.
        assert!(reporter.get_job(ids[2]).is_some());
        assert!(reporter.get_job(ids[3]).is_some());
        assert!(reporter.get_job(ids[0]).is_none());
        assert!(reporter.get_job(ids[1]).is_none());
    }

    #[test]
    fn test_summary_reflects_logs_and_latest_progress() {
        let (reporter, id) = reporter_with_job();
        reporter.add_log(id, LogLevel::Warn, "slow upload").unwrap();
        reporter.add_log(id, LogLevel::Error, "first attempt failed").unwrap();
        reporter
            .add_progress(id, "UPLOAD_START", "uploading artifact", Some(20), None)
            .unwrap();

        let summary = reporter.get_summary(id).unwrap();
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.latest_message.as_deref(), Some("uploading artifact"));
    }
}
