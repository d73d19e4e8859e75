//! Assembler configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.
//!
//! ```toml
//! default_algorithm = "md5"
//! strip_prefix = "objects"
//! fallback_log_dir = "/home/user/Desktop/moveit_logs"
//! recovery_skew_secs = 60
//! seal_logs = true
//! sort_on_finalize = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sip_manifest::{DigestAlgorithm, RelativePath};
use sip_provenance::RecoveryPolicy;

use crate::error::AssemblerError;

/// Assembler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SipConfig {
    /// Algorithm of a canonical manifest that has no records yet
    pub default_algorithm: DigestAlgorithm,
    /// Leading path prefix removed from source manifest records
    pub strip_prefix: Option<String>,
    /// Where to look for transfer logs that are missing from their
    /// expected location
    pub fallback_log_dir: Option<PathBuf>,
    /// How much later than the expected log a replacement may be
    pub recovery_skew_secs: u64,
    /// Append checksums of the `logs/` folder after consolidation
    pub seal_logs: bool,
    /// Sort the canonical manifest as the last stage
    pub sort_on_finalize: bool,
}

impl SipConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or names unknown fields
    pub fn from_toml_str(text: &str) -> Result<Self, AssemblerError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, AssemblerError> {
        let text = std::fs::read_to_string(path).map_err(|source| AssemblerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    #[inline]
    #[must_use]
    pub fn with_default_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.default_algorithm = algorithm;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fallback_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_log_dir = Some(dir.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_recovery_skew_secs(mut self, secs: u64) -> Self {
        self.recovery_skew_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_seal_logs(mut self, seal: bool) -> Self {
        self.seal_logs = seal;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_sort_on_finalize(mut self, sort: bool) -> Self {
        self.sort_on_finalize = sort;
        self
    }

    /// Strip prefix as a validated relative path
    ///
    /// # Errors
    /// Returns error if the configured prefix is not a valid relative path
    pub fn strip_prefix_path(&self) -> Result<Option<RelativePath>, AssemblerError> {
        self.strip_prefix
            .as_deref()
            .map(|prefix| {
                RelativePath::new(prefix).map_err(|err| AssemblerError::ConfigValue {
                    field: "strip_prefix",
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    /// Recovery policy for transfer logs
    ///
    /// # Errors
    /// Returns error if the skew does not fit a signed duration
    pub fn recovery_policy(&self) -> Result<RecoveryPolicy, AssemblerError> {
        let Some(dir) = &self.fallback_log_dir else {
            return Ok(RecoveryPolicy::disabled());
        };
        let secs = i64::try_from(self.recovery_skew_secs).map_err(|_| AssemblerError::ConfigValue {
            field: "recovery_skew_secs",
            reason: format!("{} is too large", self.recovery_skew_secs),
        })?;
        let skew = chrono::Duration::try_seconds(secs).ok_or_else(|| AssemblerError::ConfigValue {
            field: "recovery_skew_secs",
            reason: format!("{secs} is out of range"),
        })?;
        Ok(RecoveryPolicy::new(dir).with_max_skew(skew))
    }

    fn validate(&self) -> Result<(), AssemblerError> {
        self.strip_prefix_path()?;
        self.recovery_policy()?;
        Ok(())
    }
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            default_algorithm: DigestAlgorithm::Md5,
            strip_prefix: None,
            fallback_log_dir: None,
            recovery_skew_secs: 60,
            seal_logs: true,
            sort_on_finalize: true,
        }
    }
}
