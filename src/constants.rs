//! # System Constants
//!
//! Stable codes, track names, and operational limits for the submission
//! orchestrator. Progress codes are the wire contract for external progress
//! polling and must remain stable across versions.

/// Progress codes emitted over a job's lifetime.
///
/// External callers key on these strings; renaming one is a breaking change.
pub mod progress {
    // Job lifecycle
    pub const JOB_STARTED: &str = "JOB_STARTED";
    pub const JOB_COMPLETED: &str = "JOB_COMPLETED";
    pub const JOB_FAILED: &str = "JOB_FAILED";
    pub const JOB_CANCELLED: &str = "JOB_CANCELLED";
    pub const JOB_RETRY_SCHEDULED: &str = "JOB_RETRY_SCHEDULED";

    // Submission steps
    pub const VALIDATION_START: &str = "VALIDATION_START";
    pub const VALIDATION_COMPLETE: &str = "VALIDATION_COMPLETE";
    pub const UPLOAD_START: &str = "UPLOAD_START";
    pub const UPLOAD_COMPLETE: &str = "UPLOAD_COMPLETE";
    pub const BUILD_PROCESSING: &str = "BUILD_PROCESSING";
    pub const BUILD_PROCESSED: &str = "BUILD_PROCESSED";
    pub const TRACK_ASSIGNED: &str = "TRACK_ASSIGNED";
    pub const VERSION_SUBMITTED: &str = "VERSION_SUBMITTED";
    pub const REVIEW_PENDING: &str = "REVIEW_PENDING";

    // Rollout control
    pub const ROLLOUT_EXPANDED: &str = "ROLLOUT_EXPANDED";
    pub const ROLLOUT_HALTED: &str = "ROLLOUT_HALTED";
    pub const ROLLBACK_COMPLETE: &str = "ROLLBACK_COMPLETE";
}

/// Release track names shared by both store platforms.
pub mod tracks {
    pub const INTERNAL: &str = "internal";
    pub const ALPHA: &str = "alpha";
    pub const BETA: &str = "beta";
    pub const PRODUCTION: &str = "production";

    /// All known track names, in promotion order.
    pub const ALL: &[&str] = &[INTERNAL, ALPHA, BETA, PRODUCTION];

    /// Whether a track name refers to the production-equivalent track.
    pub fn is_production(track: &str) -> bool {
        track == PRODUCTION
    }
}

/// System-wide operational limits.
pub mod system {
    /// Number of most-recent jobs retained by the default cleanup policy.
    pub const DEFAULT_JOB_RETENTION: usize = 100;

    /// Default scheduler tick interval in milliseconds.
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

    /// Default retry budget for a new job.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default base delay for exponential backoff in milliseconds.
    pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

    /// Default cap on a single backoff delay in milliseconds.
    pub const DEFAULT_BACKOFF_MAX_MS: u64 = 60_000;

    /// Default bound on remote-status polling attempts.
    pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 30;

    /// Default delay between remote-status polling attempts in milliseconds.
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
}

/// Status groupings used by reporting and guard logic.
pub mod status_groups {
    use crate::model::JobStatus;

    /// Statuses from which a job can still be cancelled.
    pub const CANCELLABLE_STATUSES: &[JobStatus] = &[
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Waiting,
    ];

    /// Statuses that carry a final result.
    pub const TERMINAL_STATUSES: &[JobStatus] = &[
        JobStatus::Succeeded,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];
}
