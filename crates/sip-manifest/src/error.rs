//! Error types for manifest handling
//!
//! [`ParseError`] stays local to a single line; [`ManifestError`] is what
//! every file-level operation returns.

use std::path::PathBuf;

use sip_core::ContextError;
use sip_provenance::ProvenanceError;

use crate::algorithm::DigestAlgorithm;
use crate::path::PathError;

/// Malformed manifest line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Line cannot hold a digest, the separator and a path
    #[error("line too short: need at least {minimum} characters, got {actual}")]
    TooShort { minimum: usize, actual: usize },

    /// Digest contains non-hexadecimal characters
    #[error("digest is not hexadecimal: {0:?}")]
    InvalidHex(String),

    /// Digest length does not match the algorithm
    #[error("{algorithm} digest must be {expected} characters, got {actual}")]
    DigestLength {
        algorithm: DigestAlgorithm,
        expected: usize,
        actual: usize,
    },

    /// Digest is not followed by exactly two spaces
    #[error("expected two spaces after the digest")]
    MissingSeparator,

    /// Could not determine the algorithm from the line
    #[error("cannot determine digest algorithm from line")]
    UnknownAlgorithm,

    /// Path part is not a valid relative path
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

/// Manifest-level errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A line of a manifest file is malformed
    #[error("{path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: ParseError,
    },

    /// Record sets differ during algorithm migration
    #[error("integrity mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    IntegrityMismatch {
        /// Paths in the canonical manifest without a new digest
        missing: Vec<String>,
        /// Paths with a new digest but no canonical record, or supplied twice
        unexpected: Vec<String>,
    },

    /// Updater collision with an existing record
    #[error("manifest already has a record for {0}")]
    DuplicatePath(String),

    /// Same path already consolidated with a different digest
    #[error("conflicting digest for {path}: canonical has {existing}, incoming {incoming}")]
    ConflictingRecord {
        path: String,
        existing: String,
        incoming: String,
    },

    /// Digests of different algorithms mixed in one manifest
    #[error("algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch {
        expected: DigestAlgorithm,
        found: DigestAlgorithm,
    },

    /// Archive destination already exists
    #[error("cannot archive {source_path}: {destination} already exists")]
    ArchiveCollision {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Move reported success but the filesystem disagrees
    #[error("move of {source_path} to {destination} could not be confirmed")]
    MoveUnconfirmed {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Path could not be expressed relative to the manifest root
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Filesystem error on a specific path
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// Check if the error signals corrupted or divergent checksums
    #[inline]
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::IntegrityMismatch { .. }
                | Self::ConflictingRecord { .. }
                | Self::AlgorithmMismatch { .. }
        )
    }
}
