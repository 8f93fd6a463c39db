//! End-to-end worker lifecycle scenarios against a mock adapter.

mod common;

use common::{harness, payload, wait_for, MockAdapter};
use shipway_core::constants::progress;
use shipway_core::model::{JobRequest, JobStatus, JobType, Platform};
use std::time::Duration;

#[tokio::test]
async fn test_dry_run_submission_succeeds_end_to_end() {
    let h = harness(MockAdapter::new());
    h.worker.start(Duration::from_millis(10));

    let id = h.worker.submit_job(
        JobRequest::new(JobType::Submit, Platform::Ios, payload()).with_dry_run(false),
    );

    assert!(
        wait_for(Duration::from_secs(5), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(false)
        })
        .await
    );

    let job = h.reporter.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.retry_count, 0);
    assert!(job.result.is_some());
    assert!(job.error.is_none());

    let record = h.reporter.get_record(id).unwrap();
    let codes: Vec<&str> = record.progress.iter().map(|e| e.code.as_str()).collect();
    for expected in [
        progress::JOB_STARTED,
        progress::VALIDATION_COMPLETE,
        progress::UPLOAD_COMPLETE,
        progress::BUILD_PROCESSED,
        progress::TRACK_ASSIGNED,
        progress::VERSION_SUBMITTED,
        progress::REVIEW_PENDING,
        progress::JOB_COMPLETED,
    ] {
        assert!(codes.contains(&expected), "missing code {expected}");
    }

    h.worker.stop().await;
}

#[tokio::test]
async fn test_transient_failures_retry_until_success() {
    // First two attempts fail with a transient error; the third succeeds.
    let h = harness(MockAdapter::failing_validation(2));
    h.worker.start(Duration::from_millis(10));

    let id = h.worker.submit_job(
        JobRequest::new(JobType::Submit, Platform::Ios, payload()).with_max_retries(2),
    );

    assert!(
        wait_for(Duration::from_secs(10), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(false)
        })
        .await
    );

    let job = h.reporter.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.retry_count, 2);

    let record = h.reporter.get_record(id).unwrap();
    let starts = record
        .progress
        .iter()
        .filter(|e| e.code == progress::JOB_STARTED)
        .count();
    let retries = record
        .progress
        .iter()
        .filter(|e| e.code == progress::JOB_RETRY_SCHEDULED)
        .count();
    assert_eq!(starts, 3, "expected one start event per attempt");
    assert_eq!(retries, 2, "expected one retry event per failure");

    // Exactly one terminal event, matching the final status.
    let terminal: Vec<&str> = record
        .progress
        .iter()
        .map(|e| e.code.as_str())
        .filter(|c| {
            *c == progress::JOB_COMPLETED
                || *c == progress::JOB_FAILED
                || *c == progress::JOB_CANCELLED
        })
        .collect();
    assert_eq!(terminal, vec![progress::JOB_COMPLETED]);

    // The start timestamp survives retries: total duration spans both
    // backoff waits (10ms * 2 + 10ms * 4), which a per-attempt reset would
    // not.
    assert!(job.duration_ms().unwrap() >= 50);

    h.worker.stop().await;
}

#[tokio::test]
async fn test_exhausted_retry_budget_fails_job() {
    let h = harness(MockAdapter::failing_validation(usize::MAX));
    h.worker.start(Duration::from_millis(10));

    let id = h.worker.submit_job(
        JobRequest::new(JobType::Submit, Platform::Ios, payload()).with_max_retries(1),
    );

    assert!(
        wait_for(Duration::from_secs(10), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(false)
        })
        .await
    );

    let job = h.reporter.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 1);
    assert!(job.error.as_deref().unwrap().contains("injected"));

    let record = h.reporter.get_record(id).unwrap();
    let terminal: Vec<&str> = record
        .progress
        .iter()
        .map(|e| e.code.as_str())
        .filter(|c| {
            *c == progress::JOB_COMPLETED
                || *c == progress::JOB_FAILED
                || *c == progress::JOB_CANCELLED
        })
        .collect();
    assert_eq!(terminal, vec![progress::JOB_FAILED]);

    h.worker.stop().await;
}

#[tokio::test]
async fn test_progress_percentages_monotonic_across_retries() {
    let h = harness(MockAdapter::failing_validation(1));
    h.worker.start(Duration::from_millis(10));

    let id = h.worker.submit_job(
        JobRequest::new(JobType::Submit, Platform::Ios, payload()).with_max_retries(1),
    );

    assert!(
        wait_for(Duration::from_secs(10), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status == JobStatus::Succeeded)
                .unwrap_or(false)
        })
        .await
    );

    let record = h.reporter.get_record(id).unwrap();
    let mut previous = 0u8;
    for event in &record.progress {
        if let Some(pct) = event.percentage {
            assert!(
                pct >= previous,
                "percentage regressed from {previous} to {pct} at {}",
                event.code
            );
            previous = pct;
        }
    }
    assert_eq!(previous, 100);

    h.worker.stop().await;
}

#[tokio::test]
async fn test_worker_statistics_reflect_load() {
    let h = harness(MockAdapter::new());

    // Not started yet: submissions stay queued.
    let _ = h.worker.submit_job(JobRequest::new(
        JobType::HaltRollout,
        Platform::Ios,
        payload(),
    ));
    let stats = h.worker.statistics();
    assert_eq!(stats.queue_length, 1);
    assert_eq!(stats.active_jobs, 0);
    assert!(!stats.running);

    h.worker.start(Duration::from_millis(10));
    assert!(h.worker.statistics().running);

    assert!(
        wait_for(Duration::from_secs(5), || h
            .worker
            .statistics()
            .queue_length
            == 0)
        .await
    );

    h.worker.stop().await;
    assert!(!h.worker.statistics().running);
}

#[tokio::test]
async fn test_same_bundle_jobs_never_run_concurrently() {
    // Two blocking jobs against the same bundle: the second must not start
    // while the first is in flight, even with spare dispatch permits.
    let h = harness(MockAdapter::blocking_uploads());
    h.worker.start(Duration::from_millis(10));

    let first = h
        .worker
        .submit_job(JobRequest::new(JobType::Submit, Platform::Ios, payload()));
    let second = h
        .worker
        .submit_job(JobRequest::new(JobType::Submit, Platform::Ios, payload()));

    // First job reaches its blocking upload.
    assert!(
        wait_for(Duration::from_secs(5), || {
            h.reporter
                .get_job(first)
                .map(|j| j.status.is_active())
                .unwrap_or(false)
        })
        .await
    );
    // Give the scheduler time to (incorrectly) dispatch the second job.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.reporter.get_job(second).unwrap().status, JobStatus::Queued);
    assert_eq!(h.worker.statistics().active_jobs, 1);

    h.worker.stop().await;
}

#[tokio::test]
async fn test_failing_asset_report_fails_job_without_retry() {
    use shipway_core::assets::{AssetCollaborator, AssetReport};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    struct RejectingAssets;
    impl AssetCollaborator for RejectingAssets {
        fn prepare_assets(&self, _output_dir: &Path, _sources: &[PathBuf]) -> AssetReport {
            AssetReport::failed(vec!["icon is 512x512, store requires 1024x1024".to_string()])
        }
    }

    let h = harness(MockAdapter::new());
    h.worker.set_asset_collaborator(Arc::new(RejectingAssets));
    h.worker.start(Duration::from_millis(10));

    let id = h.worker.submit_job(
        JobRequest::new(JobType::Submit, Platform::Ios, payload()).with_max_retries(3),
    );

    assert!(
        wait_for(Duration::from_secs(5), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(false)
        })
        .await
    );

    let job = h.reporter.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    // A validation failure never consumes the retry budget.
    assert_eq!(job.retry_count, 0);
    assert!(job.error.as_deref().unwrap().contains("asset preparation failed"));

    h.worker.stop().await;
}

#[tokio::test]
async fn test_rollout_job_drives_single_capability() {
    let h = harness(MockAdapter::new());
    h.worker.start(Duration::from_millis(10));

    let mut p = payload();
    p.track = Some("production".to_string());
    p.rollout_fraction = Some(0.25);
    let id = h
        .worker
        .submit_job(JobRequest::new(JobType::ExpandRollout, Platform::Ios, p));

    assert!(
        wait_for(Duration::from_secs(5), || {
            h.reporter
                .get_job(id)
                .map(|j| j.status.is_terminal())
                .unwrap_or(false)
        })
        .await
    );

    let job = h.reporter.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    let record = h.reporter.get_record(id).unwrap();
    assert!(record
        .progress
        .iter()
        .any(|e| e.code == progress::ROLLOUT_EXPANDED));
    // One expand_rollout call, nothing else.
    assert_eq!(h.adapter.call_count(), 1);

    h.worker.stop().await;
}
