//! Boundary for the file/asset preparation collaborator.
//!
//! Asset normalization (image resizing, format conversion, staging) happens
//! outside this crate. The orchestrator hands the collaborator an output
//! directory and the source asset paths and reads back only the pass/fail
//! flag and the error list.

use std::path::{Path, PathBuf};

/// Pass/fail report from the asset collaborator.
#[derive(Debug, Clone)]
pub struct AssetReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl AssetReport {
    pub fn passed() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }
}

/// Stages release assets for upload.
///
/// Implementations live with the host process; the worker invokes this
/// before uploading a build and fails the job on a negative report.
pub trait AssetCollaborator: Send + Sync {
    fn prepare_assets(&self, output_dir: &Path, sources: &[PathBuf]) -> AssetReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_constructors() {
        assert!(AssetReport::passed().ok);
        let failed = AssetReport::failed(vec!["icon too small".to_string()]);
        assert!(!failed.ok);
        assert_eq!(failed.errors.len(), 1);
    }
}
