//! # Metadata Validation
//!
//! Pure, composable checks over a release-metadata document, plus the
//! composite preflight check that gates submission.
//!
//! Each check produces a [`ValidationResult`]; results merge with AND
//! semantics, so any category with an error-severity issue independently
//! blocks submission.

pub mod metadata;
pub mod preflight;

use serde::{Deserialize, Serialize};

pub use metadata::validate_metadata;
pub use preflight::{check_version_monotonicity, run_preflight};

/// Severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding, anchored to the field that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

/// Outcome of one or more validation checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A passing result with no findings.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        });
        self.valid = false;
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    /// Fold another result into this one. Overall validity is the AND of
    /// both.
    pub fn merge(&mut self, other: ValidationResult) {
        self.valid = self.valid && other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Find an error by field path.
    pub fn error_for(&self, field: &str) -> Option<&ValidationIssue> {
        self.errors.iter().find(|i| i.field == field)
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

/// A release-metadata document: the store listing and release parameters a
/// submission carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// Store bundle or package identifier.
    pub bundle_id: String,
    /// Listing title.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Full listing description.
    pub description: String,
    /// Primary locale, e.g. `en-US`.
    pub locale: String,
    /// Marketing version, e.g. `2.4.0`.
    pub version_name: String,
    /// Monotonically increasing build number.
    pub build_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Export-compliance declaration; must be explicitly present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_compliance: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_rating: Option<String>,
    /// Target release track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    /// Staged-rollout fraction in (0, 1], production track only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_fraction: Option<f64>,
}
