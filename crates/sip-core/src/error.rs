//! Error types for package context construction

use std::path::PathBuf;

use crate::object_entry::ObjectEntryError;

/// Errors raised while building or materializing a [`crate::PackageContext`]
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Package root has no final component to use as the UUID
    #[error("package root has no uuid component: {0}")]
    MissingUuid(PathBuf),

    /// Package root has no parent directory for the canonical manifest
    #[error("package root has no parent directory: {0}")]
    NoParent(PathBuf),

    /// UUID is empty or contains a path separator
    #[error("invalid package uuid: {0:?}")]
    InvalidUuid(String),

    /// Object entry failed validation
    #[error(transparent)]
    ObjectEntry(#[from] ObjectEntryError),

    /// Filesystem error while creating the layout
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
