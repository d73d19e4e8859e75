//! Appending checksums of files created after consolidation
//!
//! Paths are derived against the canonical manifest's own directory, so an
//! appended record reads `<uuid>/logs/...` like the consolidated ones.

use std::path::{Path, PathBuf};

use sip_provenance::{ProvenanceEvent, ProvenanceLog};
use walkdir::WalkDir;

use crate::digest::Digest;
use crate::error::ManifestError;
use crate::hasher::{FileHasher, StreamingHasher};
use crate::manifest::Manifest;
use crate::path::RelativePath;
use crate::record::ManifestRecord;
use crate::store::CanonicalManifest;

/// Appends records to a canonical manifest
#[derive(Debug, Clone)]
pub struct ManifestUpdater<'a, H = StreamingHasher> {
    canonical: &'a CanonicalManifest,
    log: &'a ProvenanceLog,
    hasher: H,
}

impl<'a> ManifestUpdater<'a, StreamingHasher> {
    #[must_use]
    pub fn new(canonical: &'a CanonicalManifest, log: &'a ProvenanceLog) -> Self {
        Self {
            canonical,
            log,
            hasher: StreamingHasher::new(),
        }
    }
}

impl<'a, H: FileHasher> ManifestUpdater<'a, H> {
    /// Swap the hashing collaborator
    #[must_use]
    pub fn with_hasher<T: FileHasher>(self, hasher: T) -> ManifestUpdater<'a, T> {
        ManifestUpdater {
            canonical: self.canonical,
            log: self.log,
            hasher,
        }
    }

    /// Append the checksum of one file
    ///
    /// A relative `file` is taken relative to the canonical manifest's
    /// directory. Without `precomputed` the file is hashed in the canonical
    /// manifest's algorithm.
    ///
    /// # Errors
    /// Returns [`ManifestError::DuplicatePath`] if the path already has a
    /// record, [`ManifestError::AlgorithmMismatch`] if `precomputed` uses
    /// another algorithm; the manifest is not written in either case
    pub fn append_entry(
        &self,
        file: &Path,
        precomputed: Option<Digest>,
    ) -> Result<ManifestRecord, ManifestError> {
        let file = self.resolve(file);
        let path = RelativePath::from_fs_path(self.canonical.base_dir(), &file)?;

        let record = self.canonical.update(|manifest| {
            let digest = match precomputed {
                Some(digest) => digest,
                None => {
                    reject_duplicate(manifest, &path)?;
                    self.hasher.digest_file(&file, manifest.algorithm())?
                }
            };
            let record = ManifestRecord::new(digest, path);
            append(manifest, record.clone())?;
            Ok(record)
        })?;

        self.log
            .record(&ProvenanceEvent::manifest_update(&file, self.canonical.path()))?;
        tracing::debug!(path = %record.path, "checksum appended");
        Ok(record)
    }

    /// Append every regular file under `dir`, recursively, in sorted order
    ///
    /// All records are committed in one transaction; a single collision
    /// aborts the whole append. The live provenance log is skipped since it
    /// keeps changing after this call.
    ///
    /// # Errors
    /// Returns error if `dir` cannot be walked, a file cannot be hashed, or
    /// any path is already recorded
    pub fn append_directory(&self, dir: &Path) -> Result<Vec<ManifestRecord>, ManifestError> {
        let dir = self.resolve(dir);
        let (files, paths) = self.files_under(&dir)?;

        let records = self.canonical.update(|manifest| {
            for path in &paths {
                reject_duplicate(manifest, path)?;
            }
            let mut records = Vec::with_capacity(paths.len());
            for (file, path) in files.iter().zip(paths) {
                let digest = self.hasher.digest_file(file, manifest.algorithm())?;
                let record = ManifestRecord::new(digest, path);
                append(manifest, record.clone())?;
                records.push(record);
            }
            Ok(records)
        })?;

        self.record_updates(&files)?;
        tracing::info!(dir = %dir.display(), records = records.len(), "directory checksums appended");
        Ok(records)
    }

    /// Like [`append_directory`](Self::append_directory), but a file already
    /// recorded with the same digest is skipped
    ///
    /// Returns only the records appended by this call, so a repeated seal of
    /// an unchanged directory appends nothing.
    ///
    /// # Errors
    /// Returns [`ManifestError::ConflictingRecord`] if a recorded file now
    /// hashes differently, or error if `dir` cannot be walked or a file
    /// cannot be hashed; the manifest is not written in either case
    pub fn seal_directory(&self, dir: &Path) -> Result<Vec<ManifestRecord>, ManifestError> {
        let dir = self.resolve(dir);
        let (files, paths) = self.files_under(&dir)?;

        let (records, appended_files) = self.canonical.update(|manifest| {
            let mut records = Vec::new();
            let mut appended_files = Vec::new();
            for (file, path) in files.iter().zip(paths) {
                let digest = self.hasher.digest_file(file, manifest.algorithm())?;
                match manifest.get(&path) {
                    Some(existing) if existing.digest.matches(&digest) => continue,
                    Some(existing) => {
                        return Err(ManifestError::ConflictingRecord {
                            path: path.to_string(),
                            existing: existing.digest.to_string(),
                            incoming: digest.to_string(),
                        })
                    }
                    None => {}
                }
                let record = ManifestRecord::new(digest, path);
                manifest.push(record.clone())?;
                records.push(record);
                appended_files.push(file.clone());
            }
            Ok((records, appended_files))
        })?;

        self.record_updates(&appended_files)?;
        tracing::info!(
            dir = %dir.display(),
            appended = records.len(),
            already_present = files.len() - records.len(),
            "directory sealed"
        );
        Ok(records)
    }

    /// Regular files under `dir` in sorted order, minus the live provenance
    /// log, with their manifest paths
    fn files_under(&self, dir: &Path) -> Result<(Vec<PathBuf>, Vec<RelativePath>), ManifestError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                ManifestError::Io {
                    path,
                    source: err.into(),
                }
            })?;
            if entry.file_type().is_file() && entry.path() != self.log.path() {
                files.push(entry.into_path());
            }
        }

        let base = self.canonical.base_dir();
        let paths = files
            .iter()
            .map(|file| RelativePath::from_fs_path(base, file))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((files, paths))
    }

    fn record_updates(&self, files: &[PathBuf]) -> Result<(), ManifestError> {
        let events: Vec<ProvenanceEvent> = files
            .iter()
            .map(|file| ProvenanceEvent::manifest_update(file, self.canonical.path()))
            .collect();
        self.log.record_all(&events)?;
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.canonical.base_dir().join(path)
        }
    }
}

fn reject_duplicate(manifest: &Manifest, path: &RelativePath) -> Result<(), ManifestError> {
    if manifest.contains_path(path) {
        Err(ManifestError::DuplicatePath(path.to_string()))
    } else {
        Ok(())
    }
}

fn append(manifest: &mut Manifest, record: ManifestRecord) -> Result<(), ManifestError> {
    reject_duplicate(manifest, &record.path)?;
    manifest.push(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::DigestAlgorithm;
    use std::fs;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn setup() -> (tempfile::TempDir, CanonicalManifest, ProvenanceLog) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("u/logs")).unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("u_manifest.md5"), DigestAlgorithm::Md5);
        let log = ProvenanceLog::new(tmp.path().join("u/logs/u_sip_log.log"));
        (tmp, canonical, log)
    }

    #[test]
    fn appends_hashed_entry_relative_to_manifest_dir() {
        let (tmp, canonical, log) = setup();
        let file = tmp.path().join("u/logs/report.txt");
        fs::write(&file, b"").unwrap();

        let record = ManifestUpdater::new(&canonical, &log).append_entry(&file, None).unwrap();

        assert_eq!(record.path.as_str(), "u/logs/report.txt");
        assert_eq!(record.digest.as_str(), EMPTY_MD5);
        assert_eq!(
            fs::read_to_string(canonical.path()).unwrap(),
            format!("{EMPTY_MD5}  u/logs/report.txt\n")
        );
        assert!(log.lines().unwrap()[0].contains("Manifest update - checksum for"));
    }

    #[test]
    fn precomputed_digest_of_wrong_algorithm_is_rejected() {
        let (tmp, canonical, log) = setup();
        let digest = Digest::new(DigestAlgorithm::Sha256, "0".repeat(64)).unwrap();

        let result = ManifestUpdater::new(&canonical, &log)
            .append_entry(&tmp.path().join("u/logs/x"), Some(digest));

        assert!(matches!(result, Err(ManifestError::AlgorithmMismatch { .. })));
        assert!(!canonical.exists());
    }

    #[test]
    fn directory_append_is_all_or_nothing() {
        let (tmp, canonical, log) = setup();
        let logs = tmp.path().join("u/logs");
        fs::write(logs.join("a.log"), b"a").unwrap();
        fs::write(logs.join("b.log"), b"b").unwrap();
        let updater = ManifestUpdater::new(&canonical, &log);
        updater.append_entry(&logs.join("b.log"), None).unwrap();
        let before = fs::read(canonical.path()).unwrap();

        let result = updater.append_directory(&logs);

        assert!(matches!(result, Err(ManifestError::DuplicatePath(ref p)) if p == "u/logs/b.log"));
        assert_eq!(fs::read(canonical.path()).unwrap(), before);
    }

    #[test]
    fn directory_append_sorts_and_skips_live_log() {
        let (tmp, canonical, log) = setup();
        let logs = tmp.path().join("u/logs");
        fs::create_dir(logs.join("nested")).unwrap();
        fs::write(logs.join("z.md5"), b"").unwrap();
        fs::write(logs.join("nested/a.log"), b"").unwrap();
        log.append_text("started").unwrap();

        let records = ManifestUpdater::new(&canonical, &log).append_directory(&logs).unwrap();

        let paths: Vec<_> = records.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["u/logs/nested/a.log", "u/logs/z.md5"]);
    }

    #[test]
    fn resealing_unchanged_directory_appends_nothing() {
        let (tmp, canonical, log) = setup();
        let logs = tmp.path().join("u/logs");
        fs::write(logs.join("a.md5"), b"").unwrap();
        let updater = ManifestUpdater::new(&canonical, &log);

        assert_eq!(updater.seal_directory(&logs).unwrap().len(), 1);
        fs::write(logs.join("b.md5"), b"").unwrap();
        let second = updater.seal_directory(&logs).unwrap();

        let paths: Vec<_> = second.iter().map(|r| r.path.to_string()).collect();
        assert_eq!(paths, vec!["u/logs/b.md5"]);
        assert_eq!(canonical.load().unwrap().len(), 2);
    }

    #[test]
    fn resealing_changed_file_conflicts() {
        let (tmp, canonical, log) = setup();
        let logs = tmp.path().join("u/logs");
        fs::write(logs.join("a.md5"), b"").unwrap();
        let updater = ManifestUpdater::new(&canonical, &log);
        updater.seal_directory(&logs).unwrap();
        fs::write(logs.join("a.md5"), b"edited").unwrap();

        let result = updater.seal_directory(&logs);

        assert!(matches!(result, Err(ManifestError::ConflictingRecord { ref path, .. }) if path == "u/logs/a.md5"));
    }
}
