//! Final ordering of the canonical manifest

use std::collections::BTreeMap;

use crate::error::ManifestError;
use crate::record::ManifestRecord;
use crate::store::CanonicalManifest;

/// Order records by ascending byte-wise path, keeping the last record
/// written for each path
#[must_use]
pub fn normalize(records: impl IntoIterator<Item = ManifestRecord>) -> Vec<ManifestRecord> {
    let mut by_path = BTreeMap::new();
    for record in records {
        by_path.insert(record.path.clone(), record);
    }
    by_path.into_values().collect()
}

/// Rewrite the canonical manifest in normalized order
///
/// Returns the number of records kept.
///
/// # Errors
/// Returns error if the manifest cannot be locked, read, parsed or replaced
pub fn sort(canonical: &CanonicalManifest) -> Result<usize, ManifestError> {
    let kept = canonical.update(|manifest| {
        let before = manifest.len();
        let records = normalize(manifest.records().iter().cloned());
        let kept = records.len();
        manifest.replace(manifest.algorithm(), records);
        if kept < before {
            tracing::warn!(collapsed = before - kept, "duplicate paths collapsed");
        }
        Ok(kept)
    })?;
    tracing::info!(canonical = %canonical.path().display(), records = kept, "manifest sorted");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::DigestAlgorithm;
    use pretty_assertions::assert_eq;

    #[test]
    fn sorts_and_collapses_to_last_written() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("u_manifest.md5"), DigestAlgorithm::Md5);
        let a = "a".repeat(32);
        let b = "b".repeat(32);
        let c = "c".repeat(32);
        std::fs::write(
            canonical.path(),
            format!("{a}  u/objects/b.mov\n{b}  u/objects/a.mov\n{c}  u/objects/b.mov\n"),
        )
        .unwrap();

        assert_eq!(sort(&canonical).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(canonical.path()).unwrap(),
            format!("{b}  u/objects/a.mov\n{c}  u/objects/b.mov\n")
        );
    }

    #[test]
    fn ordering_is_bytewise() {
        let digest = "0".repeat(32);
        let records = ["b", "B", "a/b", "a-b"]
            .iter()
            .map(|p| ManifestRecord::parse(&format!("{digest}  {p}"), DigestAlgorithm::Md5).unwrap());
        let paths: Vec<_> = normalize(records).iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["B", "a-b", "a/b", "b"]);
    }
}
