//! Manifest consolidation
//!
//! Per-source manifests left in `objects/` or `metadata/` by the hashing
//! tool are merged into the canonical manifest with their paths rebased onto
//! `<uuid>/<subtree>/`, then archived into `logs/`.
//!
//! Each manifest moves through three explicit phases:
//!
//! 1. [`DiscoveredManifest`]: recognized by file name in the subtree folder
//! 2. [`RewrittenManifest`]: parsed, paths rebased, digests untouched
//! 3. [`ArchivedManifest`]: records committed, file moved into `logs/`
//!
//! Records are committed before the file is archived. A run interrupted
//! between the two leaves the manifest in place; the retry finds its records
//! already present with identical digests and skips them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sip_core::{PackageContext, Subtree};
use sip_provenance::{ProvenanceEvent, ProvenanceLog};

use crate::algorithm::DigestAlgorithm;
use crate::error::ManifestError;
use crate::manifest::Manifest;
use crate::path::RelativePath;
use crate::record::ManifestRecord;
use crate::store::CanonicalManifest;

/// Name of the manifest a root-level copy leaves beside `objects/`
pub const ROOT_OBJECTS_MANIFEST: &str = "objects_manifest.md5";

/// A manifest file found in a subtree folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredManifest {
    pub source: PathBuf,
    pub algorithm: DigestAlgorithm,
}

/// A manifest whose records have been rebased onto the package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenManifest {
    pub source: PathBuf,
    pub algorithm: DigestAlgorithm,
    pub records: Vec<ManifestRecord>,
}

/// A manifest whose records are in the canonical manifest and whose file
/// now lives in `logs/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedManifest {
    pub source: PathBuf,
    pub archived: PathBuf,
    pub records: usize,
}

/// Outcome of consolidating one subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    pub canonical: PathBuf,
    pub subtree: Subtree,
    pub manifests: Vec<ArchivedManifest>,
    /// Records newly written to the canonical manifest
    pub records_appended: usize,
    /// Records skipped because an identical record was already present
    pub records_already_present: usize,
}

impl ConsolidationReport {
    /// True when nothing was found to consolidate
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.manifests.is_empty()
    }
}

/// Merges subtree manifests of one package into its canonical manifest
#[derive(Debug, Clone)]
pub struct ManifestConsolidator<'a> {
    ctx: &'a PackageContext,
    canonical: &'a CanonicalManifest,
    log: &'a ProvenanceLog,
    strip_prefix: Option<RelativePath>,
}

impl<'a> ManifestConsolidator<'a> {
    #[must_use]
    pub fn new(ctx: &'a PackageContext, canonical: &'a CanonicalManifest, log: &'a ProvenanceLog) -> Self {
        Self {
            ctx,
            canonical,
            log,
            strip_prefix: None,
        }
    }

    /// Remove a leading prefix from source paths before rebasing them
    #[inline]
    #[must_use]
    pub fn with_strip_prefix(mut self, prefix: Option<RelativePath>) -> Self {
        self.strip_prefix = prefix;
        self
    }

    /// Run all three phases for `subtree`
    ///
    /// A subtree without manifests is a no-op.
    ///
    /// # Errors
    /// Returns error if the subtree folder cannot be listed, a manifest is
    /// malformed, digests conflict with the canonical manifest, or a move fails.
    /// Manifests archived before the failure stay archived.
    pub fn consolidate(&self, subtree: Subtree) -> Result<ConsolidationReport, ManifestError> {
        let discovered = self.discover(subtree)?;
        let rewritten = discovered
            .iter()
            .map(|manifest| self.rewrite(subtree, manifest))
            .collect::<Result<Vec<_>, _>>()?;

        let (records_appended, records_already_present) = self.commit(&rewritten)?;

        let mut manifests = Vec::with_capacity(rewritten.len());
        for manifest in rewritten {
            manifests.push(self.archive(manifest)?);
        }

        tracing::info!(
            subtree = %subtree,
            manifests = manifests.len(),
            records = records_appended,
            "subtree consolidated"
        );
        Ok(ConsolidationReport {
            canonical: self.canonical.path().to_path_buf(),
            subtree,
            manifests,
            records_appended,
            records_already_present,
        })
    }

    /// Phase 1: manifest files directly inside the subtree folder, by name
    ///
    /// # Errors
    /// Returns error if the folder cannot be listed
    pub fn discover(&self, subtree: Subtree) -> Result<Vec<DiscoveredManifest>, ManifestError> {
        let dir = self.ctx.subtree_dir(subtree);
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir).map_err(ManifestError::io(&dir))? {
            let entry = entry.map_err(ManifestError::io(&dir))?;
            let source = entry.path();
            if !source.is_file() {
                continue;
            }
            let Some(name) = source.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if let Some(algorithm) = DigestAlgorithm::from_manifest_name(name) {
                found.push(DiscoveredManifest { source, algorithm });
            }
        }
        found.sort_by(|a, b| a.source.cmp(&b.source));
        tracing::debug!(dir = %dir.display(), count = found.len(), "manifests discovered");
        Ok(found)
    }

    /// Phase 2: parse and rebase onto `<uuid>/<subtree>/`
    ///
    /// Lines are split at the offset of the algorithm the file name declares.
    ///
    /// # Errors
    /// Returns error if the manifest cannot be read, is malformed, or holds
    /// digests of another algorithm than its name declares
    pub fn rewrite(
        &self,
        subtree: Subtree,
        manifest: &DiscoveredManifest,
    ) -> Result<RewrittenManifest, ManifestError> {
        let text = fs::read_to_string(&manifest.source).map_err(ManifestError::io(&manifest.source))?;
        let parsed = Manifest::parse_as(&text, manifest.algorithm, &manifest.source)?;
        let base = RelativePath::from_segments(&[self.ctx.uuid(), subtree.as_str()])?;

        let records = parsed
            .records()
            .iter()
            .map(|record| {
                let relative = self
                    .strip_prefix
                    .as_ref()
                    .and_then(|prefix| record.path.strip_prefix(prefix))
                    .unwrap_or_else(|| record.path.clone());
                record.with_path(relative.prefixed(&base))
            })
            .collect();

        Ok(RewrittenManifest {
            source: manifest.source.clone(),
            algorithm: manifest.algorithm,
            records,
        })
    }

    /// Commit rewritten records to the canonical manifest in one transaction
    ///
    /// Returns `(appended, already_present)`.
    ///
    /// # Errors
    /// Returns error on algorithm mismatch or a path already recorded with a
    /// different digest; the canonical manifest is then left unchanged
    pub fn commit(&self, rewritten: &[RewrittenManifest]) -> Result<(usize, usize), ManifestError> {
        let counts = self.canonical.update(|canonical| {
            let mut appended = 0;
            let mut present = 0;
            for manifest in rewritten {
                if canonical.is_empty() && canonical.algorithm() != manifest.algorithm {
                    canonical.replace(manifest.algorithm, Vec::new());
                }
                if canonical.algorithm() != manifest.algorithm {
                    return Err(ManifestError::AlgorithmMismatch {
                        expected: canonical.algorithm(),
                        found: manifest.algorithm,
                    });
                }
                for record in &manifest.records {
                    match canonical.get(&record.path) {
                        Some(existing) if existing.digest.matches(&record.digest) => present += 1,
                        Some(existing) => {
                            return Err(ManifestError::ConflictingRecord {
                                path: record.path.to_string(),
                                existing: existing.digest.to_string(),
                                incoming: record.digest.to_string(),
                            })
                        }
                        None => {
                            canonical.push(record.clone())?;
                            appended += 1;
                        }
                    }
                }
            }
            Ok((appended, present))
        })?;

        let events: Vec<ProvenanceEvent> = rewritten
            .iter()
            .map(|manifest| ProvenanceEvent::manifest_consolidation(&manifest.source, self.canonical.path()))
            .collect();
        self.log.record_all(&events)?;
        Ok(counts)
    }

    /// Phase 3: move the source manifest into `logs/` and confirm the move
    ///
    /// # Errors
    /// Returns error if the destination exists, the rename fails or the move
    /// cannot be confirmed
    pub fn archive(&self, manifest: RewrittenManifest) -> Result<ArchivedManifest, ManifestError> {
        let logs_dir = self.ctx.logs_dir();
        let archived = move_into(&manifest.source, &logs_dir)?;
        self.log
            .record(&ProvenanceEvent::manifest_movement(&manifest.source, &logs_dir))?;
        tracing::debug!(
            source = %manifest.source.display(),
            archived = %archived.display(),
            "manifest archived"
        );
        Ok(ArchivedManifest {
            source: manifest.source,
            archived,
            records: manifest.records.len(),
        })
    }
}

/// Consolidate one subtree of a package into its canonical manifest
///
/// # Errors
/// See [`ManifestConsolidator::consolidate`]
pub fn consolidate(
    ctx: &PackageContext,
    subtree: Subtree,
    log: &ProvenanceLog,
) -> Result<PathBuf, ManifestError> {
    let canonical = CanonicalManifest::for_package(ctx);
    ManifestConsolidator::new(ctx, &canonical, log).consolidate(subtree)?;
    Ok(canonical.path().to_path_buf())
}

/// Move the manifest of a root-level copy into `objects/`
///
/// A copy of the whole package root leaves `objects_manifest.md5` beside
/// `objects/` with paths starting `objects/`. The prefix is dropped and the
/// file moved into `objects/` so regular consolidation picks it up. Returns
/// the new location, or `None` when there is no such manifest.
///
/// A destination already holding the same records is a relocation
/// interrupted before the original was removed; it is completed.
///
/// # Errors
/// Returns error if the manifest is malformed, the destination exists with
/// other records, or the write fails
pub fn relocate_root_manifest(
    ctx: &PackageContext,
    log: &ProvenanceLog,
) -> Result<Option<PathBuf>, ManifestError> {
    let source = ctx.root().join(ROOT_OBJECTS_MANIFEST);
    if !source.is_file() {
        return Ok(None);
    }
    let objects_dir = ctx.subtree_dir(Subtree::Objects);
    let destination = objects_dir.join(ROOT_OBJECTS_MANIFEST);

    let text = fs::read_to_string(&source).map_err(ManifestError::io(&source))?;
    let manifest = Manifest::parse_as(&text, DigestAlgorithm::Md5, &source)?;
    let prefix = RelativePath::new(Subtree::Objects.as_str())?;
    let records: Vec<ManifestRecord> = manifest
        .records()
        .iter()
        .map(|record| match record.path.strip_prefix(&prefix) {
            Some(stripped) => record.with_path(stripped),
            None => record.clone(),
        })
        .collect();
    let rewritten = Manifest::from_records(manifest.algorithm(), records)?;

    if destination.exists() {
        let text = fs::read_to_string(&destination).map_err(ManifestError::io(&destination))?;
        let existing = Manifest::parse_as(&text, DigestAlgorithm::Md5, &destination)?;
        if existing.records() != rewritten.records() {
            return Err(ManifestError::ArchiveCollision {
                source_path: source,
                destination,
            });
        }
        tracing::info!(destination = %destination.display(), "completing interrupted root manifest relocation");
    } else {
        let mut temp =
            tempfile::NamedTempFile::new_in(&objects_dir).map_err(ManifestError::io(&objects_dir))?;
        temp.write_all(rewritten.to_text().as_bytes())
            .map_err(ManifestError::io(temp.path()))?;
        temp.as_file().sync_all().map_err(ManifestError::io(temp.path()))?;
        temp.persist_noclobber(&destination).map_err(|err| ManifestError::Io {
            path: destination.clone(),
            source: err.error,
        })?;
    }
    // The rewritten copy is durable; only now drop the original
    fs::remove_file(&source).map_err(ManifestError::io(&source))?;

    log.record(&ProvenanceEvent::manifest_movement(&source, &objects_dir))?;
    Ok(Some(destination))
}

fn move_into(source: &Path, dir: &Path) -> Result<PathBuf, ManifestError> {
    let file_name = source.file_name().ok_or_else(|| ManifestError::Io {
        path: source.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let destination = dir.join(file_name);
    if destination.exists() {
        return Err(ManifestError::ArchiveCollision {
            source_path: source.to_path_buf(),
            destination,
        });
    }
    fs::rename(source, &destination).map_err(ManifestError::io(source))?;
    if !destination.is_file() || source.exists() {
        return Err(ManifestError::MoveUnconfirmed {
            source_path: source.to_path_buf(),
            destination,
        });
    }
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_core::ObjectEntry;

    const A: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn package(tmp: &Path) -> PackageContext {
        let ctx = PackageContext::under(tmp, ObjectEntry::Number("oe1234".into()), "1234").unwrap();
        ctx.create_layout().unwrap();
        ctx
    }

    #[test]
    fn discover_only_matches_manifest_names() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let objects = ctx.subtree_dir(Subtree::Objects);
        fs::write(objects.join("b.md5"), "").unwrap();
        fs::write(objects.join("a.md5"), "").unwrap();
        fs::write(objects.join("file1.mov"), "").unwrap();
        fs::create_dir(objects.join("dir.md5")).unwrap();

        let canonical = CanonicalManifest::for_package(&ctx);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        let found = ManifestConsolidator::new(&ctx, &canonical, &log)
            .discover(Subtree::Objects)
            .unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|m| m.source.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.md5", "b.md5"]);
    }

    #[test]
    fn rewrite_applies_strip_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let source = ctx.subtree_dir(Subtree::Objects).join("a.md5");
        fs::write(&source, format!("{A}  objects/reel/f.mov\n{A}  other.mov\n")).unwrap();

        let canonical = CanonicalManifest::for_package(&ctx);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        let consolidator = ManifestConsolidator::new(&ctx, &canonical, &log)
            .with_strip_prefix(Some(RelativePath::new("objects").unwrap()));
        let rewritten = consolidator
            .rewrite(
                Subtree::Objects,
                &DiscoveredManifest {
                    source,
                    algorithm: DigestAlgorithm::Md5,
                },
            )
            .unwrap();

        let paths: Vec<_> = rewritten.records.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["1234/objects/reel/f.mov", "1234/objects/other.mov"]);
        assert!(rewritten.records.iter().all(|r| r.digest.as_str() == A));
    }

    #[test]
    fn archive_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let source = ctx.subtree_dir(Subtree::Objects).join("a.md5");
        fs::write(&source, "").unwrap();
        fs::write(ctx.logs_dir().join("a.md5"), "older").unwrap();

        let canonical = CanonicalManifest::for_package(&ctx);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        let result = ManifestConsolidator::new(&ctx, &canonical, &log).archive(RewrittenManifest {
            source: source.clone(),
            algorithm: DigestAlgorithm::Md5,
            records: Vec::new(),
        });

        assert!(matches!(result, Err(ManifestError::ArchiveCollision { .. })));
        assert!(source.exists());
        assert_eq!(fs::read_to_string(ctx.logs_dir().join("a.md5")).unwrap(), "older");
    }

    #[test]
    fn relocate_root_manifest_strips_objects_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        fs::write(
            ctx.root().join(ROOT_OBJECTS_MANIFEST),
            format!("{A}  objects/file1.mov\n"),
        )
        .unwrap();
        let log = ProvenanceLog::new(ctx.provenance_log_path());

        let moved = relocate_root_manifest(&ctx, &log).unwrap().unwrap();

        assert!(!ctx.root().join(ROOT_OBJECTS_MANIFEST).exists());
        assert_eq!(fs::read_to_string(&moved).unwrap(), format!("{A}  file1.mov\n"));
        assert_eq!(log.lines().unwrap().len(), 1);
    }

    #[test]
    fn relocate_root_manifest_without_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        assert_eq!(relocate_root_manifest(&ctx, &log).unwrap(), None);
        assert!(!log.path().exists());
    }

    #[test]
    fn relocate_root_manifest_completes_interrupted_move() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let source = ctx.root().join(ROOT_OBJECTS_MANIFEST);
        fs::write(&source, format!("{A}  objects/file1.mov\n")).unwrap();
        let destination = ctx.subtree_dir(Subtree::Objects).join(ROOT_OBJECTS_MANIFEST);
        fs::write(&destination, format!("{A}  file1.mov\n")).unwrap();
        let log = ProvenanceLog::new(ctx.provenance_log_path());

        let moved = relocate_root_manifest(&ctx, &log).unwrap();

        assert_eq!(moved, Some(destination.clone()));
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), format!("{A}  file1.mov\n"));
        assert_eq!(log.lines().unwrap().len(), 1);
    }

    #[test]
    fn relocate_root_manifest_refuses_different_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let source = ctx.root().join(ROOT_OBJECTS_MANIFEST);
        fs::write(&source, format!("{A}  objects/file1.mov\n")).unwrap();
        let destination = ctx.subtree_dir(Subtree::Objects).join(ROOT_OBJECTS_MANIFEST);
        fs::write(&destination, format!("{A}  file2.mov\n")).unwrap();
        let log = ProvenanceLog::new(ctx.provenance_log_path());

        let result = relocate_root_manifest(&ctx, &log);

        assert!(matches!(result, Err(ManifestError::ArchiveCollision { .. })));
        assert!(source.exists());
        assert!(!log.path().exists());
    }

    #[test]
    fn rewrite_rejects_digests_of_undeclared_algorithm() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let source = ctx.subtree_dir(Subtree::Objects).join("a.md5");
        fs::write(&source, format!("{}  file1.mov\n", "0".repeat(128))).unwrap();

        let canonical = CanonicalManifest::for_package(&ctx);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        let result = ManifestConsolidator::new(&ctx, &canonical, &log).consolidate(Subtree::Objects);

        assert!(matches!(result, Err(ManifestError::Parse { ref path, line: 1, .. }) if *path == source));
        assert!(source.exists());
        assert!(!canonical.exists());
    }

    #[test]
    fn digest_case_does_not_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = package(tmp.path());
        let objects = ctx.subtree_dir(Subtree::Objects);
        fs::write(objects.join("a.md5"), format!("{A}  file1.mov\n")).unwrap();
        fs::write(objects.join("b.md5"), format!("{}  file1.mov\n", A.to_uppercase())).unwrap();

        let canonical = CanonicalManifest::for_package(&ctx);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        let report = ManifestConsolidator::new(&ctx, &canonical, &log)
            .consolidate(Subtree::Objects)
            .unwrap();

        assert_eq!(report.records_appended, 1);
        assert_eq!(report.records_already_present, 1);
        assert_eq!(
            fs::read_to_string(canonical.path()).unwrap(),
            format!("{A}  1234/objects/file1.mov\n")
        );
    }
}
