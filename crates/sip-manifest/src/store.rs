//! Canonical manifest persistence
//!
//! Every mutation of the canonical manifest is a locked read-modify-write:
//! take the exclusive lock, read the whole file, mutate in memory, write a
//! temporary sibling, fsync it and rename it over the original. A closure
//! that fails leaves the file untouched.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sip_core::PackageContext;

use crate::algorithm::DigestAlgorithm;
use crate::error::ManifestError;
use crate::manifest::Manifest;

/// The single package-wide manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalManifest {
    path: PathBuf,
    default_algorithm: DigestAlgorithm,
}

impl CanonicalManifest {
    /// Manifest at `path`; `default_algorithm` applies while it has no records
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, default_algorithm: DigestAlgorithm) -> Self {
        Self {
            path: path.into(),
            default_algorithm,
        }
    }

    /// `<parent>/<uuid>_manifest.md5` of a package
    #[inline]
    #[must_use]
    pub fn for_package(ctx: &PackageContext) -> Self {
        Self::new(ctx.canonical_manifest_path(), DigestAlgorithm::Md5)
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn default_algorithm(&self) -> DigestAlgorithm {
        self.default_algorithm
    }

    /// Directory record paths are relative to
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    #[inline]
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the current content under a shared lock
    ///
    /// An absent file reads as an empty manifest.
    ///
    /// # Errors
    /// Returns error if the file cannot be locked, read or parsed
    pub fn load(&self) -> Result<Manifest, ManifestError> {
        let lock = self.open_lock()?;
        FileExt::lock_shared(&lock).map_err(ManifestError::io(self.lock_path()))?;
        let manifest = self.read_unlocked();
        drop(lock);
        manifest
    }

    /// Run `operation` on the content under the exclusive lock and persist it
    ///
    /// The file is created if absent. Nothing is written when `operation`
    /// returns an error.
    ///
    /// # Errors
    /// Returns the operation's error, or an error if locking, reading or
    /// writing fails
    pub fn update<T>(
        &self,
        operation: impl FnOnce(&mut Manifest) -> Result<T, ManifestError>,
    ) -> Result<T, ManifestError> {
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock).map_err(ManifestError::io(self.lock_path()))?;
        let mut manifest = self.read_unlocked()?;
        let result = operation(&mut manifest)?;
        self.write_atomic(&manifest)?;
        drop(lock);
        Ok(result)
    }

    /// Remove the hidden lock file once no further operation will run
    ///
    /// The lock is taken first so a writer still holding it finishes before
    /// the file goes. Absent lock file is a no-op.
    ///
    /// # Errors
    /// Returns error if the lock file cannot be locked or removed
    pub fn remove_lock_file(&self) -> Result<(), ManifestError> {
        let lock_path = self.lock_path();
        if !lock_path.exists() {
            return Ok(());
        }
        let lock = self.open_lock()?;
        FileExt::lock_exclusive(&lock).map_err(ManifestError::io(&lock_path))?;
        fs::remove_file(&lock_path).map_err(ManifestError::io(&lock_path))?;
        drop(lock);
        Ok(())
    }

    fn read_unlocked(&self) -> Result<Manifest, ManifestError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Manifest::parse(&text, self.default_algorithm, &self.path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(Manifest::new(self.default_algorithm))
            }
            Err(source) => Err(ManifestError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_atomic(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let dir = self.base_dir();
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(ManifestError::io(dir))?;
        temp.write_all(manifest.to_text().as_bytes())
            .map_err(ManifestError::io(temp.path()))?;
        temp.as_file()
            .sync_all()
            .map_err(ManifestError::io(temp.path()))?;
        temp.persist(&self.path).map_err(|err| ManifestError::Io {
            path: self.path.clone(),
            source: err.error,
        })?;
        tracing::trace!(path = %self.path.display(), records = manifest.len(), "canonical manifest written");
        Ok(())
    }

    /// Hidden sibling `.<name>.lock`; the manifest itself is replaced on
    /// every write so it cannot carry the lock
    fn lock_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.base_dir().join(format!(".{name}.lock"))
    }

    fn open_lock(&self) -> Result<File, ManifestError> {
        let lock_path = self.lock_path();
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(ManifestError::io(lock_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ManifestRecord;

    const A: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn record(path: &str) -> ManifestRecord {
        ManifestRecord::parse(&format!("{A}  {path}"), DigestAlgorithm::Md5).unwrap()
    }

    #[test]
    fn lock_file_is_removed_on_request() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("x_manifest.md5"), DigestAlgorithm::Md5);
        canonical.update(|manifest| manifest.push(record("a"))).unwrap();
        assert!(canonical.lock_path().exists());

        canonical.remove_lock_file().unwrap();
        canonical.remove_lock_file().unwrap();

        assert!(!canonical.lock_path().exists());
        assert_eq!(canonical.load().unwrap().len(), 1);
    }

    #[test]
    fn absent_manifest_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("x_manifest.md5"), DigestAlgorithm::Md5);
        assert!(canonical.load().unwrap().is_empty());
        assert!(!canonical.exists());
    }

    #[test]
    fn update_creates_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("x_manifest.md5"), DigestAlgorithm::Md5);

        canonical.update(|manifest| manifest.push(record("a"))).unwrap();
        canonical.update(|manifest| manifest.push(record("b"))).unwrap();

        let text = fs::read_to_string(canonical.path()).unwrap();
        assert_eq!(text, format!("{A}  a\n{A}  b\n"));
    }

    #[test]
    fn failed_update_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("x_manifest.md5"), DigestAlgorithm::Md5);
        canonical.update(|manifest| manifest.push(record("a"))).unwrap();
        let before = fs::read(canonical.path()).unwrap();

        let result: Result<(), _> = canonical.update(|manifest| {
            manifest.push(record("b"))?;
            Err(ManifestError::DuplicatePath("b".into()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(canonical.path()).unwrap(), before);
    }

    #[test]
    fn concurrent_updates_do_not_lose_records() {
        let tmp = tempfile::tempdir().unwrap();
        let canonical = CanonicalManifest::new(tmp.path().join("x_manifest.md5"), DigestAlgorithm::Md5);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let canonical = &canonical;
                scope.spawn(move || {
                    for i in 0..10 {
                        canonical
                            .update(|manifest| manifest.push(record(&format!("w{worker}/f{i}"))))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(canonical.load().unwrap().len(), 40);
    }

    #[test]
    fn lock_file_is_hidden_sibling() {
        let canonical = CanonicalManifest::new("/sips/abcd_manifest.md5", DigestAlgorithm::Md5);
        assert_eq!(canonical.lock_path(), PathBuf::from("/sips/.abcd_manifest.md5.lock"));
    }
}
