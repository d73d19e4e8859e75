//! Digest algorithms and their fixed hex lengths

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Digest algorithm a manifest was written with
///
/// The hex length of the algorithm is the only thing the line parser needs
/// to find the digest/path boundary.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [Self; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// Number of hexadecimal characters in a digest
    #[inline]
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Algorithm whose digests have `len` hex characters
    #[inline]
    #[must_use]
    pub fn from_hex_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|algorithm| algorithm.hex_len() == len)
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Algorithm implied by a manifest file name
    ///
    /// Recognizes `*.md5`, `*.sha1`, `*.sha256`, `*.sha512` and the
    /// `*-sha512.txt` style written by the second hashing pass.
    #[must_use]
    pub fn from_manifest_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|algorithm| {
            let name = algorithm.name();
            lower
                .strip_suffix(name)
                .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
                || lower
                    .strip_suffix(".txt")
                    .and_then(|stem| stem.strip_suffix(name))
                    .is_some_and(|stem| stem.ends_with('-') && stem.len() > 1)
        })
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unsupported digest algorithm: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_lengths_match_algorithms() {
        assert_eq!(DigestAlgorithm::Md5.hex_len(), 32);
        assert_eq!(DigestAlgorithm::Sha512.hex_len(), 128);
        for algorithm in DigestAlgorithm::ALL {
            assert_eq!(DigestAlgorithm::from_hex_len(algorithm.hex_len()), Some(algorithm));
        }
        assert_eq!(DigestAlgorithm::from_hex_len(33), None);
    }

    #[test]
    fn manifest_names_are_recognized() {
        assert_eq!(
            DigestAlgorithm::from_manifest_name("reel1_manifest.md5"),
            Some(DigestAlgorithm::Md5)
        );
        assert_eq!(
            DigestAlgorithm::from_manifest_name("1234_manifest-sha512.txt"),
            Some(DigestAlgorithm::Sha512)
        );
        assert_eq!(
            DigestAlgorithm::from_manifest_name("FILE.SHA256"),
            Some(DigestAlgorithm::Sha256)
        );
        assert_eq!(DigestAlgorithm::from_manifest_name("file1.mov"), None);
        assert_eq!(DigestAlgorithm::from_manifest_name("notes.txt"), None);
        assert_eq!(DigestAlgorithm::from_manifest_name(".md5"), None);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("SHA-512".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha512);
        assert_eq!("md5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }
}
