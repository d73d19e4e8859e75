//! Checksum algorithm migration
//!
//! Substitutes every digest of the canonical manifest with the digest of the
//! same file under a new algorithm. The replacement is supplied by the
//! caller as a manifest in the new algorithm; its path set must be exactly
//! the canonical one.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sip_provenance::{ProvenanceEvent, ProvenanceLog};

use crate::algorithm::DigestAlgorithm;
use crate::digest::Digest;
use crate::error::ManifestError;
use crate::manifest::Manifest;
use crate::record::ManifestRecord;
use crate::store::CanonicalManifest;

/// Outcome of a successful migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub canonical: PathBuf,
    pub from: DigestAlgorithm,
    pub to: DigestAlgorithm,
    pub records_updated: usize,
}

/// Replace the canonical manifest's digests with those of `replacement`
///
/// Record order is kept; only digests change. Nothing is written unless the
/// two path sets are identical.
///
/// # Errors
/// Returns [`ManifestError::IntegrityMismatch`] listing the paths only one
/// side has, or duplicated in the replacement; lock and I/O errors otherwise
pub fn replace_algorithm(
    canonical: &CanonicalManifest,
    replacement: &Manifest,
    log: &ProvenanceLog,
) -> Result<MigrationSummary, ManifestError> {
    let to = replacement.algorithm();
    let (from, records_updated) = canonical.update(|current| {
        let by_path = index_replacement(current, replacement)?;
        let from = current.algorithm();
        let records = current
            .records()
            .iter()
            .map(|record| match by_path.get(record.path.as_str()) {
                Some(digest) => ManifestRecord::new((*digest).clone(), record.path.clone()),
                None => record.clone(),
            })
            .collect::<Vec<_>>();
        let updated = records.len();
        current.replace(to, records);
        Ok((from, updated))
    })?;

    log.record(&ProvenanceEvent::checksum_migration(
        from.name(),
        to.name(),
        records_updated,
        canonical.path(),
    ))?;
    tracing::info!(
        canonical = %canonical.path().display(),
        from = %from,
        to = %to,
        records = records_updated,
        "checksums migrated"
    );

    Ok(MigrationSummary {
        canonical: canonical.path().to_path_buf(),
        from,
        to,
        records_updated,
    })
}

/// Load the replacement manifest from `path`, then [`replace_algorithm`]
///
/// # Errors
/// Returns error if the replacement cannot be read or parsed, or the
/// migration fails
pub fn replace_algorithm_from_file(
    canonical: &CanonicalManifest,
    path: &Path,
    log: &ProvenanceLog,
) -> Result<MigrationSummary, ManifestError> {
    let replacement = Manifest::read(path, DigestAlgorithm::Sha512)?;
    replace_algorithm(canonical, &replacement, log)
}

fn index_replacement<'a>(
    current: &Manifest,
    replacement: &'a Manifest,
) -> Result<HashMap<&'a str, &'a Digest>, ManifestError> {
    let mut by_path = HashMap::with_capacity(replacement.len());
    let mut duplicated = BTreeSet::new();
    for record in replacement.records() {
        if by_path.insert(record.path.as_str(), &record.digest).is_some() {
            duplicated.insert(record.path.to_string());
        }
    }

    let expected: BTreeSet<&str> = current.paths().map(|path| path.as_str()).collect();
    let missing: Vec<String> = expected
        .iter()
        .filter(|path| !by_path.contains_key(*path))
        .map(|path| (*path).to_string())
        .collect();
    let mut unexpected: BTreeSet<String> = by_path
        .keys()
        .filter(|path| !expected.contains(*path))
        .map(|path| (*path).to_string())
        .collect();
    unexpected.extend(duplicated);

    if missing.is_empty() && unexpected.is_empty() {
        Ok(by_path)
    } else {
        Err(ManifestError::IntegrityMismatch {
            missing,
            unexpected: unexpected.into_iter().collect(),
        })
    }
}
