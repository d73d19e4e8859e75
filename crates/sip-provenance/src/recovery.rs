//! Recovery of transfer logs that are not where they were expected
//!
//! A transfer to two destinations at once produces two logs whose names
//! differ only in the trailing seconds. When the expected log is gone, the
//! most recent sibling with the same item prefix is authoritative.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProvenanceError;

static LOG_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<prefix>.+)_(?P<stamp>\d{4}_\d{2}_\d{2}T\d{2}_\d{2}_\d{2})\.log$")
        .expect("log name pattern is valid")
});

const STAMP_FORMAT: &str = "%Y_%m_%dT%H_%M_%S";

/// Transfer log file name: `<item prefix>_YYYY_MM_DDTHH_MM_SS.log`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogName {
    prefix: String,
    timestamp: NaiveDateTime,
}

impl LogName {
    /// Parse a bare file name
    #[must_use]
    pub fn parse(file_name: &str) -> Option<Self> {
        let captures = LOG_NAME.captures(file_name)?;
        let timestamp = NaiveDateTime::parse_from_str(&captures["stamp"], STAMP_FORMAT).ok()?;
        Some(Self {
            prefix: captures["prefix"].to_string(),
            timestamp,
        })
    }

    /// Parse the final component of a path
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::parse)
    }

    /// Item-identifying part of the name
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Where and how to look for a replacement log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    fallback_dir: Option<PathBuf>,
    max_skew: Duration,
}

impl RecoveryPolicy {
    /// Default window a replacement may trail the expected log by
    pub const DEFAULT_MAX_SKEW_SECS: i64 = 60;

    /// Search `fallback_dir` with the default skew window
    #[must_use]
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            fallback_dir: Some(fallback_dir.into()),
            max_skew: Duration::seconds(Self::DEFAULT_MAX_SKEW_SECS),
        }
    }

    /// Never recover; missing logs stay missing
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            fallback_dir: None,
            max_skew: Duration::zero(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew = max_skew;
        self
    }

    #[inline]
    #[must_use]
    pub fn fallback_dir(&self) -> Option<&Path> {
        self.fallback_dir.as_deref()
    }

    /// Choose among candidates for `expected`
    ///
    /// A candidate qualifies when it shares the prefix and its timestamp is
    /// strictly later, by no more than the skew window. The latest qualifying
    /// timestamp wins; equal timestamps fall back to the greatest path.
    pub fn select<I>(&self, expected: &LogName, candidates: I) -> Option<PathBuf>
    where
        I: IntoIterator<Item = (LogName, PathBuf)>,
    {
        candidates
            .into_iter()
            .filter(|(name, _)| {
                name.prefix == expected.prefix
                    && name.timestamp > expected.timestamp
                    && name.timestamp - expected.timestamp <= self.max_skew
            })
            .max_by(|(a, a_path), (b, b_path)| {
                a.timestamp.cmp(&b.timestamp).then_with(|| a_path.cmp(b_path))
            })
            .map(|(_, path)| path)
    }

    /// Look in the fallback directory for a replacement of `expected`
    ///
    /// # Errors
    /// Returns error if the fallback directory exists but cannot be listed
    pub fn find_replacement(&self, expected: &Path) -> Result<Option<PathBuf>, ProvenanceError> {
        let Some(dir) = self.fallback_dir.as_deref() else {
            return Ok(None);
        };
        let Some(expected_name) = LogName::from_path(expected) else {
            tracing::debug!(path = %expected.display(), "log name carries no timestamp, cannot recover");
            return Ok(None);
        };
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %dir.display(), "fallback log directory does not exist");
                return Ok(None);
            }
            Err(source) => {
                return Err(ProvenanceError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ProvenanceError::io(dir))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = LogName::from_path(&path) {
                candidates.push((name, path));
            }
        }
        Ok(self.select(&expected_name, candidates))
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
