//! Preflight gate scenarios: document validation composed with
//! adapter-backed remote-version checks.

mod common;

use common::MockAdapter;
use shipway_core::config::OrchestratorConfig;
use shipway_core::credentials::CredentialsProvider;
use shipway_core::model::Platform;
use shipway_core::service::SubmissionService;
use shipway_core::validation::{self, ReleaseMetadata};

fn document() -> ReleaseMetadata {
    ReleaseMetadata {
        bundle_id: "com.example.app".to_string(),
        title: "Example App".to_string(),
        subtitle: None,
        description: "An example application for release testing.".to_string(),
        locale: "en-US".to_string(),
        version_name: "1.2.0".to_string(),
        build_number: 42,
        contact_email: Some("release@example.com".to_string()),
        contact_phone: Some("+1 555 0100".to_string()),
        privacy_policy_url: Some("https://example.com/privacy".to_string()),
        support_url: Some("https://example.com/support".to_string()),
        copyright: Some("2026 Example Inc.".to_string()),
        category: Some("productivity".to_string()),
        export_compliance: Some(false),
        content_rating: Some("4+".to_string()),
        track: Some("beta".to_string()),
        rollout_fraction: None,
    }
}

fn dry_run_service() -> SubmissionService {
    SubmissionService::new(
        OrchestratorConfig::default(),
        CredentialsProvider::unconfigured(true, true),
    )
}

#[tokio::test]
async fn test_preflight_passes_for_complete_document() {
    let service = dry_run_service();
    let result = service
        .run_preflight(&document(), Platform::Ios, true)
        .await
        .unwrap();
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
}

#[tokio::test]
async fn test_preflight_blocks_on_missing_contact_email() {
    let service = dry_run_service();
    let mut doc = document();
    doc.contact_email = None;
    let result = service
        .run_preflight(&doc, Platform::Ios, true)
        .await
        .unwrap();
    assert!(!result.valid);
    assert!(result.error_for("contact_email").is_some());
}

#[tokio::test]
async fn test_stale_build_number_suggests_next() {
    // The remote already has build 42; submitting 42 must fail outside
    // dry-run with a pointer at 43.
    let adapter = MockAdapter {
        remote_build: Some(42),
        ..MockAdapter::new()
    };
    let result = validation::run_preflight(&adapter, &document(), false).await;
    assert!(!result.valid);
    let issue = result.error_for("build_number").unwrap();
    assert!(issue.message.contains("next available is 43"));
}

#[tokio::test]
async fn test_stale_build_number_degrades_to_warning_in_dry_run() {
    let adapter = MockAdapter {
        remote_build: Some(42),
        ..MockAdapter::new()
    };
    let result = validation::run_preflight(&adapter, &document(), true).await;
    assert!(result.valid);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.field == "build_number" && w.message.contains("next available is 43")));
}

#[tokio::test]
async fn test_rollout_fraction_gates_production_submissions() {
    let service = dry_run_service();

    let mut doc = document();
    doc.track = Some("production".to_string());
    doc.rollout_fraction = Some(1.5);
    let result = service
        .run_preflight(&doc, Platform::Android, true)
        .await
        .unwrap();
    assert!(!result.valid);
    assert!(result.error_for("rollout_fraction").is_some());

    doc.rollout_fraction = Some(0.05);
    let result = service
        .run_preflight(&doc, Platform::Android, true)
        .await
        .unwrap();
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
}

#[tokio::test]
async fn test_preflight_against_both_platforms_merges_results() {
    let service = dry_run_service();
    let mut doc = document();
    doc.export_compliance = None;
    let result = service
        .run_preflight(&doc, Platform::Both, true)
        .await
        .unwrap();
    assert!(!result.valid);
    // The document error surfaces once per platform pass.
    assert_eq!(
        result
            .errors
            .iter()
            .filter(|i| i.field == "export_compliance")
            .count(),
        2
    );
}

#[test]
fn test_validate_metadata_is_pure_and_synchronous() {
    let service = dry_run_service();
    let mut doc = document();
    doc.title = "x".repeat(64);
    let result = service.validate_metadata(&doc);
    assert!(!result.valid);
    assert!(result.error_for("title").is_some());
}
