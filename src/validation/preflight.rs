//! Composite preflight check: document validation plus adapter-backed
//! remote-version monotonicity.

use super::{metadata::validate_metadata, ReleaseMetadata, ValidationResult};
use crate::adapters::PlatformAdapter;
use crate::model::SubmissionPayload;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Check that the new build number is strictly greater than the last known
/// remote build.
///
/// In dry-run mode this degrades to a warning rather than an error. When the
/// check fails, the message suggests the next available build number.
pub fn check_version_monotonicity(
    remote_build: Option<u64>,
    build_number: u64,
    dry_run: bool,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let Some(remote) = remote_build else {
        result.add_warning(
            "build_number",
            "remote build number is unknown, monotonicity not verified",
        );
        return result;
    };

    if build_number > remote {
        return result;
    }

    let message = format!(
        "build number {build_number} is not greater than the last remote build {remote}; \
         next available is {}",
        remote + 1
    );
    if dry_run {
        result.add_warning("build_number", message);
    } else {
        result.add_error("build_number", message);
    }
    result
}

/// Run the full preflight gate: document checks AND remote-version checks.
///
/// Any category may independently block submission. The remote lookup goes
/// through the adapter's validation capability; a lookup failure is an error
/// outside dry-run and a warning within it.
pub async fn run_preflight(
    adapter: &dyn PlatformAdapter,
    metadata: &ReleaseMetadata,
    dry_run: bool,
) -> ValidationResult {
    let mut result = validate_metadata(metadata);

    let payload = SubmissionPayload {
        bundle_id: metadata.bundle_id.clone(),
        version_name: metadata.version_name.clone(),
        build_number: metadata.build_number,
        artifact_path: None,
        track: metadata.track.clone(),
        rollout_fraction: metadata.rollout_fraction,
        metadata: None,
    };

    let cancel = CancellationToken::new();
    match adapter.validate_submission(&payload, &cancel).await {
        Ok(remote) => {
            debug!(
                bundle_id = %metadata.bundle_id,
                remote_build = remote.latest_build_number,
                "Remote state resolved for preflight"
            );
            result.merge(check_version_monotonicity(
                remote.latest_build_number,
                metadata.build_number,
                dry_run,
            ));
        }
        Err(e) if dry_run => {
            result.add_warning("remote", format!("remote validation skipped: {e}"));
        }
        Err(e) => {
            result.add_error("remote", format!("remote validation failed: {e}"));
        }
    }

    result
}
