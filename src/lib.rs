#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Shipway Core
//!
//! Release-submission orchestration engine: a job queue and worker that
//! drive multi-step, long-running submissions of app releases to the store
//! platforms, with per-job progress tracking, retry with exponential
//! backoff, and metadata preflight gating.
//!
//! ## Architecture
//!
//! A caller builds a [`model::Job`] through its typed factory and submits it
//! to the [`worker::SubmissionWorker`], which queues it, registers it with
//! the [`reporter::StatusReporter`], and on a scheduler tick executes the
//! platform-specific sequence of [`adapters::PlatformAdapter`] capability
//! calls, emitting a progress event per step. Failed attempts retry with
//! exponential backoff until the job's retry budget is exhausted.
//!
//! ## Module Organization
//!
//! - [`model`] - Job records, types, and the status state machine
//! - [`queue`] - Priority-ordered pending queue
//! - [`worker`] - Dispatch loop, backoff policy, step sequences
//! - [`reporter`] - Authoritative job state, progress, and statistics
//! - [`adapters`] - Per-platform capability clients and their factory
//! - [`assets`] - Boundary to the asset preparation collaborator
//! - [`validation`] - Metadata checks and the preflight gate
//! - [`service`] - Composition root and external surface
//! - [`config`] - Operational settings
//! - [`credentials`] - Platform credential bundles
//! - [`events`] - Live progress fan-out
//! - [`error`] - Error taxonomy and retry classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shipway_core::config::OrchestratorConfig;
//! use shipway_core::credentials::CredentialsProvider;
//! use shipway_core::model::{JobRequest, JobType, Platform, SubmissionPayload};
//! use shipway_core::service::SubmissionService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrchestratorConfig::default();
//! let credentials = CredentialsProvider::unconfigured(true, true);
//! let service = SubmissionService::new(config, credentials);
//! service.start();
//!
//! let payload = SubmissionPayload {
//!     bundle_id: "com.example.app".to_string(),
//!     version_name: "1.2.0".to_string(),
//!     build_number: 42,
//!     artifact_path: Some("/builds/app.aab".to_string()),
//!     track: Some("beta".to_string()),
//!     rollout_fraction: None,
//!     metadata: None,
//! };
//! let request = JobRequest::new(JobType::Submit, Platform::Both, payload).with_dry_run(true);
//! let job_id = service.submit_job(request)?;
//! println!("submitted {job_id}");
//!
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod assets;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod queue;
pub mod reporter;
pub mod service;
pub mod validation;
pub mod worker;

pub use config::{BackoffSettings, OrchestratorConfig, PollSettings};
pub use credentials::CredentialsProvider;
pub use error::{ErrorDisposition, OrchestratorError, Result};
pub use model::{
    DeliveryMechanism, Job, JobId, JobRequest, JobStatus, JobType, Platform, SubmissionPayload,
};
pub use reporter::{JobStatistics, JobSummary, StatusReporter};
pub use service::SubmissionService;
pub use validation::{ReleaseMetadata, ValidationResult};
pub use worker::{SubmissionWorker, WorkerStatistics};
