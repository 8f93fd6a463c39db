//! Core data model: jobs and their lifecycle states.

pub mod job;
pub mod states;

pub use job::{
    DeliveryMechanism, Job, JobId, JobRequest, JobType, Platform, SubmissionPayload,
};
pub use states::JobStatus;
