//! Object entry identifiers
//!
//! An object entry is the accession number an archive assigns when material
//! arrives. It is distinct from the package UUID and decides the folder the
//! package lives in.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Accession identifier for a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectEntry {
    /// `oe` followed by four or five digits
    Number(String),
    /// Special collections workflow: the package is not filed under an entry
    NotApplicable,
}

impl ObjectEntry {
    /// Placeholder text used when no entry applies
    pub const NOT_APPLICABLE: &'static str = "not_applicable";

    /// Folder segment the package is placed under, if any
    #[inline]
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        match self {
            Self::Number(value) => Some(value),
            Self::NotApplicable => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_applicable(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl Display for ObjectEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => f.write_str(value),
            Self::NotApplicable => f.write_str(Self::NOT_APPLICABLE),
        }
    }
}

impl FromStr for ObjectEntry {
    type Err = ObjectEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NOT_APPLICABLE {
            return Ok(Self::NotApplicable);
        }
        let digits = s
            .strip_prefix("oe")
            .ok_or_else(|| ObjectEntryError::MissingPrefix(s.to_string()))?;
        if !(4..=5).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ObjectEntryError::InvalidNumber(s.to_string()));
        }
        Ok(Self::Number(s.to_string()))
    }
}

/// Object entry validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectEntryError {
    /// First two characters are not `oe`
    #[error("object entry must start with 'oe': {0}")]
    MissingPrefix(String),

    /// Not four or five trailing digits
    #[error("object entry must end with four or five digits: {0}")]
    InvalidNumber(String),
}
