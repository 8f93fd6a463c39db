//! Document-level checks: schema shape, cross-field completeness,
//! compliance flags, and staged-rollout sanity.

use super::{ReleaseMetadata, ValidationResult};
use crate::constants::tracks;

/// Maximum listing title length accepted by both stores.
const MAX_TITLE_LENGTH: usize = 30;

/// Maximum subtitle length.
const MAX_SUBTITLE_LENGTH: usize = 30;

/// Description length bounds.
const MIN_DESCRIPTION_LENGTH: usize = 10;
const MAX_DESCRIPTION_LENGTH: usize = 4000;

/// Listing categories accepted by the submission pipeline.
const KNOWN_CATEGORIES: &[&str] = &[
    "business",
    "education",
    "entertainment",
    "finance",
    "games",
    "health_fitness",
    "lifestyle",
    "music",
    "news",
    "productivity",
    "social",
    "travel",
    "utilities",
];

/// Schema shape and field constraints.
pub fn check_schema(metadata: &ReleaseMetadata) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if metadata.bundle_id.is_empty() {
        result.add_error("bundle_id", "bundle identifier is required");
    } else if !is_valid_bundle_id(&metadata.bundle_id) {
        result.add_error(
            "bundle_id",
            format!(
                "{:?} is not a valid reverse-DNS bundle identifier",
                metadata.bundle_id
            ),
        );
    }

    if metadata.title.trim().is_empty() {
        result.add_error("title", "title is required");
    } else if metadata.title.chars().count() > MAX_TITLE_LENGTH {
        result.add_error(
            "title",
            format!("title exceeds {MAX_TITLE_LENGTH} characters"),
        );
    }

    if let Some(subtitle) = &metadata.subtitle {
        if subtitle.chars().count() > MAX_SUBTITLE_LENGTH {
            result.add_error(
                "subtitle",
                format!("subtitle exceeds {MAX_SUBTITLE_LENGTH} characters"),
            );
        }
    }

    let description_length = metadata.description.chars().count();
    if description_length < MIN_DESCRIPTION_LENGTH {
        result.add_error(
            "description",
            format!("description must be at least {MIN_DESCRIPTION_LENGTH} characters"),
        );
    } else if description_length > MAX_DESCRIPTION_LENGTH {
        result.add_error(
            "description",
            format!("description exceeds {MAX_DESCRIPTION_LENGTH} characters"),
        );
    }

    if !is_valid_locale(&metadata.locale) {
        result.add_error(
            "locale",
            format!("{:?} is not a valid locale, expected e.g. en-US", metadata.locale),
        );
    }

    if !is_valid_version_name(&metadata.version_name) {
        result.add_error(
            "version_name",
            format!(
                "{:?} is not a dotted numeric version, expected e.g. 2.4.0",
                metadata.version_name
            ),
        );
    }

    if metadata.build_number == 0 {
        result.add_error("build_number", "build number must be at least 1");
    }

    for (field, url) in [
        ("privacy_policy_url", &metadata.privacy_policy_url),
        ("support_url", &metadata.support_url),
    ] {
        if let Some(url) = url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                result.add_error(field, format!("{url:?} is not an http(s) URL"));
            }
        }
    }

    if let Some(category) = &metadata.category {
        if !KNOWN_CATEGORIES.contains(&category.as_str()) {
            result.add_error("category", format!("unknown category {category:?}"));
        }
    }

    if let Some(track) = &metadata.track {
        if !tracks::ALL.contains(&track.as_str()) {
            result.add_error("track", format!("unknown track {track:?}"));
        }
    }

    result
}

/// Cross-field completeness: contact and legal fields a reviewable
/// submission must carry.
pub fn check_completeness(metadata: &ReleaseMetadata) -> ValidationResult {
    let mut result = ValidationResult::ok();

    match &metadata.contact_email {
        None => result.add_error("contact_email", "contact email is required"),
        Some(email) if !is_plausible_email(email) => {
            result.add_error("contact_email", format!("{email:?} is not an email address"));
        }
        Some(_) => {}
    }

    if metadata.privacy_policy_url.is_none() {
        result.add_error("privacy_policy_url", "privacy policy URL is required");
    }

    if metadata.copyright.is_none() {
        result.add_error("copyright", "copyright line is required");
    }

    if metadata.contact_phone.is_none() {
        result.add_warning("contact_phone", "contact phone is recommended for review");
    }

    if metadata.support_url.is_none() {
        result.add_warning("support_url", "support URL is recommended");
    }

    result
}

/// Compliance flags the stores require before review.
pub fn check_compliance(metadata: &ReleaseMetadata) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if metadata.export_compliance.is_none() {
        result.add_error(
            "export_compliance",
            "export compliance declaration is required",
        );
    }

    if metadata.content_rating.is_none() {
        result.add_warning("content_rating", "content rating is not set");
    }

    result
}

/// Staged-rollout fraction sanity.
///
/// A fraction must lie in (0, 1] and only applies to the production track;
/// on any other track it is a warning rather than an error.
pub fn check_rollout(metadata: &ReleaseMetadata) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let Some(fraction) = metadata.rollout_fraction else {
        return result;
    };

    let track = metadata.track.as_deref().unwrap_or(tracks::INTERNAL);
    if tracks::is_production(track) {
        if fraction <= 0.0 || fraction > 1.0 {
            result.add_error(
                "rollout_fraction",
                format!("staged-rollout fraction {fraction} must lie in (0, 1]"),
            );
        }
    } else {
        result.add_warning(
            "rollout_fraction",
            format!("staged rollout only applies to the production track, not {track:?}"),
        );
    }

    result
}

/// The full document-level validation: schema, completeness, compliance,
/// and rollout sanity, AND-composed.
pub fn validate_metadata(metadata: &ReleaseMetadata) -> ValidationResult {
    let mut result = check_schema(metadata);
    result.merge(check_completeness(metadata));
    result.merge(check_compliance(metadata));
    result.merge(check_rollout(metadata));
    result
}

fn is_valid_bundle_id(bundle_id: &str) -> bool {
    let segments: Vec<&str> = bundle_id.split('.').collect();
    segments.len() >= 2
        && segments.iter().all(|s| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

fn is_valid_locale(locale: &str) -> bool {
    let mut parts = locale.splitn(2, '-');
    let language = parts.next().unwrap_or("");
    let region = parts.next().unwrap_or("");
    language.len() == 2
        && language.chars().all(|c| c.is_ascii_lowercase())
        && region.len() == 2
        && region.chars().all(|c| c.is_ascii_uppercase())
}

fn is_valid_version_name(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
