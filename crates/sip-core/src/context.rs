//! Package context
//!
//! Every path the manifest and log engines build is derived from one
//! [`PackageContext`] value instead of ambient state.

use std::path::{Path, PathBuf};

use crate::error::ContextError;
use crate::layout::Subtree;
use crate::object_entry::ObjectEntry;

/// Root, UUID and object entry of one package
///
/// The UUID is trusted as supplied; only path-safety is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    root: PathBuf,
    parent: PathBuf,
    uuid: String,
    object_entry: ObjectEntry,
}

impl PackageContext {
    /// Build a context for an existing package root
    ///
    /// The UUID is the final component of `root`.
    ///
    /// # Errors
    /// Returns error if `root` has no final component or no parent
    pub fn new(root: impl Into<PathBuf>, object_entry: ObjectEntry) -> Result<Self, ContextError> {
        let root = root.into();
        let uuid = root
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ContextError::MissingUuid(root.clone()))?
            .to_string();
        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ContextError::NoParent(root.clone()))?
            .to_path_buf();
        Ok(Self {
            root,
            parent,
            uuid,
            object_entry,
        })
    }

    /// Compose `<output>/<object entry>/<uuid>`
    ///
    /// Packages without an applicable object entry sit directly in `output`.
    ///
    /// # Errors
    /// Returns error if `uuid` is empty or contains a path separator
    pub fn under(
        output: impl AsRef<Path>,
        object_entry: ObjectEntry,
        uuid: impl Into<String>,
    ) -> Result<Self, ContextError> {
        let uuid = uuid.into();
        if uuid.is_empty() || uuid.contains(|c: char| c == '/' || c == '\\') || uuid == "." || uuid == ".." {
            return Err(ContextError::InvalidUuid(uuid));
        }
        let parent = match object_entry.folder() {
            Some(folder) => output.as_ref().join(folder),
            None => output.as_ref().to_path_buf(),
        };
        Ok(Self {
            root: parent.join(&uuid),
            parent,
            uuid,
            object_entry,
        })
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds the package root and its canonical manifest
    #[inline]
    #[must_use]
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[inline]
    #[must_use]
    pub fn object_entry(&self) -> &ObjectEntry {
        &self.object_entry
    }

    #[inline]
    #[must_use]
    pub fn subtree_dir(&self, subtree: Subtree) -> PathBuf {
        self.root.join(subtree.as_str())
    }

    #[inline]
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.subtree_dir(Subtree::Logs)
    }

    /// `<parent>/<uuid>_manifest.md5`, sibling of the package root
    #[inline]
    #[must_use]
    pub fn canonical_manifest_path(&self) -> PathBuf {
        self.parent.join(format!("{}_manifest.md5", self.uuid))
    }

    /// `<parent>/<uuid>_manifest-sha512.txt`, written by a second hashing pass
    #[inline]
    #[must_use]
    pub fn sha512_manifest_path(&self) -> PathBuf {
        self.parent.join(format!("{}_manifest-sha512.txt", self.uuid))
    }

    /// `<root>/logs/<uuid>_sip_log.log`
    #[inline]
    #[must_use]
    pub fn provenance_log_path(&self) -> PathBuf {
        self.logs_dir().join(format!("{}_sip_log.log", self.uuid))
    }

    /// Create the `objects/`, `metadata/` and `logs/` folders
    ///
    /// Existing folders are left alone.
    ///
    /// # Errors
    /// Returns error if a folder cannot be created
    pub fn create_layout(&self) -> Result<(), ContextError> {
        for subtree in Subtree::ALL {
            let dir = self.subtree_dir(subtree);
            std::fs::create_dir_all(&dir).map_err(|source| ContextError::Io { path: dir, source })?;
        }
        Ok(())
    }

    /// Identifier assignment events for the provenance log
    #[must_use]
    pub fn identifier_events(&self) -> Vec<String> {
        let mut events = vec![format!(
            "eventType=Identifier assignement, eventIdentifierType=UUID, value={}, module=uuid.uuid4",
            self.uuid
        )];
        if let ObjectEntry::Number(entry) = &self.object_entry {
            events.push(format!(
                "eventType=Identifier assignement, eventIdentifierType=object entry, value={entry}"
            ));
        }
        events
    }
}
