//! Error types for provenance logging

use std::path::PathBuf;

/// Errors raised while reading or writing provenance logs
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    /// Filesystem error on a specific path
    #[error("provenance io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Log file is not valid UTF-8 text
    #[error("log is not valid text: {0}")]
    NotText(PathBuf),
}

impl ProvenanceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
