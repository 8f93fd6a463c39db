//! # Job Model
//!
//! The unit of work driven by the submission worker: what to submit, where,
//! with what priority and retry budget, plus the lifecycle timestamps the
//! status reporter exposes to external callers.
//!
//! Jobs are created through [`Job::new`] from a [`JobRequest`], owned by the
//! queue until dispatch, and mutated only by the worker and the reporter.

use crate::constants::system;
use crate::validation::ReleaseMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use super::states::JobStatus;

/// Opaque job identifier.
pub type JobId = Uuid;

/// The submission intent a job carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Full submission: validate, upload, await processing, assign track,
    /// commit for review.
    Submit,
    /// Expand the staged-rollout fraction of a live release.
    ExpandRollout,
    /// Halt a staged rollout.
    HaltRollout,
    /// Roll back to the previously shipped release.
    Rollback,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::ExpandRollout => write!(f, "expand_rollout"),
            Self::HaltRollout => write!(f, "halt_rollout"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Target store platform for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    Both,
}

impl Platform {
    /// The concrete platforms this selection expands to, in execution order.
    pub fn singles(&self) -> &'static [Platform] {
        match self {
            Self::Ios => &[Platform::Ios],
            Self::Android => &[Platform::Android],
            Self::Both => &[Platform::Ios, Platform::Android],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ios => write!(f, "ios"),
            Self::Android => write!(f, "android"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// How a submission reaches the store: direct API client, a wrapped CLI
/// tool, or a managed build service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMechanism {
    #[default]
    DirectApi,
    CliTool,
    BuildService,
}

impl fmt::Display for DeliveryMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectApi => write!(f, "direct_api"),
            Self::CliTool => write!(f, "cli_tool"),
            Self::BuildService => write!(f, "build_service"),
        }
    }
}

/// Type-specific data for a submission job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Store bundle or package identifier, e.g. `com.example.app`.
    pub bundle_id: String,
    /// Marketing version, e.g. `2.4.0`.
    pub version_name: String,
    /// Monotonically increasing build number.
    pub build_number: u64,
    /// Path to the signed artifact to upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    /// Target release track; defaults to `internal` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    /// Staged-rollout fraction in (0, 1], production track only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_fraction: Option<f64>,
    /// Store listing metadata attached to this submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ReleaseMetadata>,
}

impl SubmissionPayload {
    /// Target track, falling back to the internal track.
    pub fn track_or_default(&self) -> &str {
        self.track.as_deref().unwrap_or(crate::constants::tracks::INTERNAL)
    }
}

/// Input to the job factory.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_type: JobType,
    pub platform: Platform,
    pub payload: SubmissionPayload,
    pub priority: i32,
    pub max_retries: u32,
    pub dry_run: bool,
    pub mechanism: DeliveryMechanism,
}

impl JobRequest {
    /// Create a request with default priority, retry budget, and delivery
    /// mechanism.
    pub fn new(job_type: JobType, platform: Platform, payload: SubmissionPayload) -> Self {
        Self {
            job_type,
            platform,
            payload,
            priority: 0,
            max_retries: system::DEFAULT_MAX_RETRIES,
            dry_run: false,
            mechanism: DeliveryMechanism::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_mechanism(mut self, mechanism: DeliveryMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }
}

/// One queued unit of submission work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub platform: Platform,
    pub mechanism: DeliveryMechanism,
    pub priority: i32,
    pub status: JobStatus,
    pub payload: SubmissionPayload,
    pub created_at: DateTime<Utc>,
    /// Set exactly once on the first dispatch attempt, never reset on retry,
    /// so reported duration covers total wall time including backoff waits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl Job {
    /// Factory for new jobs. Assigns the identifier and creation timestamp
    /// and starts the job in the queued state.
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: request.job_type,
            platform: request.platform,
            mechanism: request.mechanism,
            priority: request.priority,
            status: JobStatus::Queued,
            payload: request.payload,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: request.max_retries,
            dry_run: request.dry_run,
            error: None,
            result: None,
        }
    }

    /// Record the start of a dispatch attempt. The start timestamp is set on
    /// the first attempt only.
    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
    }

    /// Increment the retry counter, saturating at the retry budget.
    ///
    /// Returns the new count, or `None` if the budget was already exhausted.
    pub fn increment_retry(&mut self) -> Option<u32> {
        if self.retry_count >= self.max_retries {
            return None;
        }
        self.retry_count += 1;
        Some(self.retry_count)
    }

    /// Whether another retry is allowed after a failed attempt.
    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Total wall time from first dispatch to completion, when both are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
