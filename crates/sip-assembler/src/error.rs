//! Error types for SIP assembly

use std::path::PathBuf;

use sip_core::ContextError;
use sip_manifest::ManifestError;
use sip_provenance::ProvenanceError;

/// Errors raised by the assembler and its configuration
#[derive(Debug, thiserror::Error)]
pub enum AssemblerError {
    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for [`crate::SipConfig`]
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configured value is syntactically valid but unusable
    #[error("invalid config value for {field}: {reason}")]
    ConfigValue { field: &'static str, reason: String },

    /// Migration was requested but no replacement manifest exists
    #[error("replacement manifest not found: {0}")]
    MissingReplacement(PathBuf),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),
}

impl AssemblerError {
    /// Check if the failure means checksums can no longer be trusted
    #[inline]
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Manifest(err) if err.is_integrity_failure())
    }
}
