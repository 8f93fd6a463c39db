//! Step-sequence resolution: which adapter capabilities run for a job type,
//! with the progress code and target percentage each one reports.
//!
//! Percentages are chosen monotonically increasing within a sequence; when a
//! job targets both platforms the worker scales them into per-platform
//! bands so the overall figure still only moves forward.

use crate::constants::progress;
use crate::model::JobType;

/// The adapter capability a step drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// `validate_submission`
    Validate,
    /// `upload_build`
    Upload,
    /// `poll_build_status`; the job reports waiting while this runs.
    AwaitProcessing,
    /// `assign_track`
    AssignTrack,
    /// `commit_submission`
    Commit,
    /// Report the review state returned by the commit step.
    ConfirmReview,
    /// `expand_rollout`
    ExpandRollout,
    /// `halt_rollout`
    HaltRollout,
    /// `rollback_release`
    Rollback,
}

/// One step in a submission sequence.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionStep {
    pub action: StepAction,
    /// Event emitted before the capability runs, when the step has one.
    pub start: Option<(&'static str, u8)>,
    /// Event emitted after the capability succeeds.
    pub complete: (&'static str, u8),
}

/// The full submission pipeline for one platform.
const SUBMIT_STEPS: &[SubmissionStep] = &[
    SubmissionStep {
        action: StepAction::Validate,
        start: Some((progress::VALIDATION_START, 5)),
        complete: (progress::VALIDATION_COMPLETE, 12),
    },
    SubmissionStep {
        action: StepAction::Upload,
        start: Some((progress::UPLOAD_START, 15)),
        complete: (progress::UPLOAD_COMPLETE, 40),
    },
    SubmissionStep {
        action: StepAction::AwaitProcessing,
        start: Some((progress::BUILD_PROCESSING, 45)),
        complete: (progress::BUILD_PROCESSED, 65),
    },
    SubmissionStep {
        action: StepAction::AssignTrack,
        start: None,
        complete: (progress::TRACK_ASSIGNED, 75),
    },
    SubmissionStep {
        action: StepAction::Commit,
        start: None,
        complete: (progress::VERSION_SUBMITTED, 85),
    },
    SubmissionStep {
        action: StepAction::ConfirmReview,
        start: None,
        complete: (progress::REVIEW_PENDING, 95),
    },
];

const EXPAND_ROLLOUT_STEPS: &[SubmissionStep] = &[SubmissionStep {
    action: StepAction::ExpandRollout,
    start: None,
    complete: (progress::ROLLOUT_EXPANDED, 90),
}];

const HALT_ROLLOUT_STEPS: &[SubmissionStep] = &[SubmissionStep {
    action: StepAction::HaltRollout,
    start: None,
    complete: (progress::ROLLOUT_HALTED, 90),
}];

const ROLLBACK_STEPS: &[SubmissionStep] = &[SubmissionStep {
    action: StepAction::Rollback,
    start: None,
    complete: (progress::ROLLBACK_COMPLETE, 90),
}];

/// Resolve the per-platform step sequence for a job type.
pub fn resolve_steps(job_type: JobType) -> &'static [SubmissionStep] {
    match job_type {
        JobType::Submit => SUBMIT_STEPS,
        JobType::ExpandRollout => EXPAND_ROLLOUT_STEPS,
        JobType::HaltRollout => HALT_ROLLOUT_STEPS,
        JobType::Rollback => ROLLBACK_STEPS,
    }
}

/// Scale a per-platform percentage into the band for platform `index` of
/// `count`, keeping the overall figure monotonic across platforms.
pub fn scale_percentage(index: usize, count: usize, percentage: u8) -> u8 {
    debug_assert!(count > 0 && index < count);
    ((index * 100 + percentage as usize) / count.max(1)) as u8
}
