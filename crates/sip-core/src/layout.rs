//! Fixed package subtrees

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three folders every package root carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subtree {
    /// Preserved payload
    Objects,
    /// Technical and derived metadata
    Metadata,
    /// Provenance log and archived manifests
    Logs,
}

impl Subtree {
    /// All subtrees, in creation order
    pub const ALL: [Self; 3] = [Self::Objects, Self::Metadata, Self::Logs];

    /// Folder name on disk
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Metadata => "metadata",
            Self::Logs => "logs",
        }
    }
}

impl Display for Subtree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subtree {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "objects" => Ok(Self::Objects),
            "metadata" => Ok(Self::Metadata),
            "logs" => Ok(Self::Logs),
            other => Err(format!("unknown subtree: {other}")),
        }
    }
}
