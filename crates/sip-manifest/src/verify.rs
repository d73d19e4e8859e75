//! Re-hashing payload against the canonical manifest

use serde::Serialize;

use crate::error::ManifestError;
use crate::hasher::FileHasher;
use crate::store::CanonicalManifest;

/// Per-path outcome of a verification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub ok: Vec<String>,
    pub missing: Vec<String>,
    pub mismatched: Vec<String>,
}

impl VerificationReport {
    /// True when every record matched its file
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn checked(&self) -> usize {
        self.ok.len() + self.missing.len() + self.mismatched.len()
    }
}

/// Hash every recorded file and compare with its recorded digest
///
/// Files resolve against the canonical manifest's directory. Digests compare
/// case-insensitively. The manifest is only read.
///
/// # Errors
/// Returns error if the manifest cannot be read or a present file cannot be
/// hashed
pub fn verify<H: FileHasher>(
    canonical: &CanonicalManifest,
    hasher: &H,
) -> Result<VerificationReport, ManifestError> {
    let manifest = canonical.load()?;
    let base = canonical.base_dir();
    let mut report = VerificationReport::default();

    for record in manifest.records() {
        let file = record.path.to_fs_path(base);
        if !file.is_file() {
            report.missing.push(record.path.to_string());
            continue;
        }
        let actual = hasher.digest_file(&file, record.algorithm())?;
        if actual.matches(&record.digest) {
            report.ok.push(record.path.to_string());
        } else {
            tracing::warn!(path = %record.path, "checksum mismatch");
            report.mismatched.push(record.path.to_string());
        }
    }

    tracing::info!(
        canonical = %canonical.path().display(),
        ok = report.ok.len(),
        missing = report.missing.len(),
        mismatched = report.mismatched.len(),
        "manifest verified"
    );
    Ok(report)
}
