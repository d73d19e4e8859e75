//! Relative paths as recorded in manifests
//!
//! Provides [`RelativePath`], a forward-slash path relative to a declared
//! root.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Path of a file relative to a manifest root
///
/// Always forward-slash separated, never absolute, never escaping its root.
/// Ordering is byte-wise ordering of the joined text.
///
/// # Examples
/// - `file1.mov`
/// - `1234/objects/reel1/file1.mov`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath(String);

impl RelativePath {
    /// Build from slash-separated text
    ///
    /// Backslashes are read as separators and `.` segments are dropped.
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, escapes its root, has an
    /// empty segment or ends in whitespace
    pub fn new(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        if text.ends_with(char::is_whitespace) {
            return Err(PathError::TrailingWhitespace(text.to_string()));
        }
        let normalized = text.replace('\\', "/");
        if normalized.starts_with('/') {
            return Err(PathError::Absolute(text.to_string()));
        }
        let mut segments = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" => return Err(PathError::EmptySegment(text.to_string())),
                "." => {}
                ".." => return Err(PathError::EscapesRoot(text.to_string())),
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(segments.join("/")))
    }

    /// Build from individual segments
    ///
    /// # Errors
    /// Returns error if any segment is invalid or contains a separator
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, PathError> {
        for segment in segments {
            let segment = segment.as_ref();
            if segment.contains(|c: char| c == '/' || c == '\\') {
                return Err(PathError::InvalidSegment(segment.to_string()));
            }
        }
        let joined: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
        Self::new(&joined.join("/"))
    }

    /// Path of `path` relative to the directory `base`
    ///
    /// # Errors
    /// Returns error if `path` is not under `base` or is not valid UTF-8
    pub fn from_fs_path(base: &Path, path: &Path) -> Result<Self, PathError> {
        let relative = path.strip_prefix(base).map_err(|_| PathError::NotDescendant {
            path: path.display().to_string(),
            ancestor: base.display().to_string(),
        })?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(
                    segment
                        .to_str()
                        .ok_or_else(|| PathError::NotUtf8(path.display().to_string()))?,
                ),
                Component::CurDir => {}
                _ => return Err(PathError::EscapesRoot(path.display().to_string())),
            }
        }
        Self::from_segments(&segments)
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// Always false; a relative path has at least one segment
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Final segment
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// `prefix/self`
    #[must_use]
    pub fn prefixed(&self, prefix: &Self) -> Self {
        Self(format!("{}/{}", prefix.0, self.0))
    }

    /// Check if this path starts with all of `prefix`'s segments
    #[inline]
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0 == prefix.0
            || self
                .0
                .strip_prefix(prefix.0.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Remove a leading `prefix`, if present and not the whole path
    #[must_use]
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        self.0
            .strip_prefix(prefix.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| Self(rest.to_string()))
    }

    /// Resolve against a directory on disk
    #[must_use]
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelativePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when working with relative paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("absolute path not allowed: {0}")]
    Absolute(String),

    #[error("empty segment in path: {0}")]
    EmptySegment(String),

    #[error("path escapes its root: {0}")]
    EscapesRoot(String),

    #[error("trailing whitespace in path: {0:?}")]
    TrailingWhitespace(String),

    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    #[error("path is not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("{path} is not under {ancestor}")]
    NotDescendant { path: String, ancestor: String },
}
