//! Single manifest lines
//!
//! A record is `<digest><two spaces><relative path>`. The digest/path
//! boundary sits at the algorithm's hex length, so the same parser handles
//! MD5 and SHA-512 manifests.

use std::fmt::{self, Display, Formatter};

use crate::algorithm::DigestAlgorithm;
use crate::digest::Digest;
use crate::error::ParseError;
use crate::path::RelativePath;

/// Digest/path separator
pub const SEPARATOR: &str = "  ";

/// One checksum entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManifestRecord {
    pub digest: Digest,
    pub path: RelativePath,
}

impl ManifestRecord {
    #[inline]
    #[must_use]
    pub fn new(digest: Digest, path: RelativePath) -> Self {
        Self { digest, path }
    }

    /// Parse one line written with `algorithm`
    ///
    /// A trailing `\n` or `\r\n` is ignored.
    ///
    /// # Errors
    /// Returns error if the line is too short, the digest is not hex, the
    /// separator is wrong or the path is invalid
    pub fn parse(line: &str, algorithm: DigestAlgorithm) -> Result<Self, ParseError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        let hex_len = algorithm.hex_len();
        let minimum = hex_len + SEPARATOR.len() + 1;
        if line.len() < minimum {
            return Err(ParseError::TooShort {
                minimum,
                actual: line.len(),
            });
        }

        // Non-ASCII before the boundary can never be a hex digest
        let digest = line
            .get(..hex_len)
            .ok_or_else(|| ParseError::InvalidHex(line.chars().take(hex_len).collect()))?;
        let digest = Digest::new(algorithm, digest)?;

        let rest = &line[hex_len..];
        let path = rest
            .strip_prefix(SEPARATOR)
            .ok_or(ParseError::MissingSeparator)?;

        Ok(Self {
            digest,
            path: RelativePath::new(path)?,
        })
    }

    /// Guess the algorithm of a line from where its separator sits
    #[must_use]
    pub fn detect_algorithm(line: &str) -> Option<DigestAlgorithm> {
        line.find(SEPARATOR).and_then(DigestAlgorithm::from_hex_len)
    }

    /// Parse a line of unknown algorithm
    ///
    /// # Errors
    /// Returns error if no algorithm fits or the line is malformed
    pub fn parse_detect(line: &str) -> Result<Self, ParseError> {
        let algorithm = Self::detect_algorithm(line).ok_or(ParseError::UnknownAlgorithm)?;
        Self::parse(line, algorithm)
    }

    /// Render without a line terminator
    #[inline]
    #[must_use]
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    #[inline]
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.digest.algorithm()
    }

    /// Same record under a different path; the digest is carried over untouched
    #[inline]
    #[must_use]
    pub fn with_path(&self, path: RelativePath) -> Self {
        Self {
            digest: self.digest.clone(),
            path,
        }
    }
}

impl Display for ManifestRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.digest, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn parses_md5_line() {
        let record =
            ManifestRecord::parse(&format!("{EMPTY_MD5}  file1.mov\n"), DigestAlgorithm::Md5).unwrap();
        assert_eq!(record.digest.as_str(), EMPTY_MD5);
        assert_eq!(record.path.as_str(), "file1.mov");
    }

    #[test]
    fn parses_sha512_line_with_same_parser() {
        let digest = "cf".repeat(64);
        let line = format!("{digest}  objects/reel 1.mov\r\n");
        let record = ManifestRecord::parse(&line, DigestAlgorithm::Sha512).unwrap();
        assert_eq!(record.digest.as_str(), digest);
        assert_eq!(record.path.as_str(), "objects/reel 1.mov");
    }

    #[test]
    fn rejects_short_line() {
        let result = ManifestRecord::parse("d41d8cd9  x", DigestAlgorithm::Md5);
        assert!(matches!(result, Err(ParseError::TooShort { minimum: 35, .. })));
    }

    #[test]
    fn rejects_non_hex_digest() {
        let line = format!("{}  file", "g".repeat(32));
        let result = ManifestRecord::parse(&line, DigestAlgorithm::Md5);
        assert!(matches!(result, Err(ParseError::InvalidHex(_))));
    }

    #[test]
    fn rejects_single_space_separator() {
        let line = format!("{EMPTY_MD5} file1.mov");
        let result = ManifestRecord::parse(&line, DigestAlgorithm::Md5);
        assert!(matches!(result, Err(ParseError::MissingSeparator)));
    }

    #[test]
    fn md5_line_read_as_sha512_is_too_short() {
        let line = format!("{EMPTY_MD5}  file1.mov");
        let result = ManifestRecord::parse(&line, DigestAlgorithm::Sha512);
        assert!(matches!(result, Err(ParseError::TooShort { .. })));
    }

    #[test]
    fn detects_algorithm_from_separator() {
        let md5 = format!("{EMPTY_MD5}  file1.mov");
        let sha = format!("{}  file1.mov", "0".repeat(128));
        assert_eq!(ManifestRecord::detect_algorithm(&md5), Some(DigestAlgorithm::Md5));
        assert_eq!(ManifestRecord::detect_algorithm(&sha), Some(DigestAlgorithm::Sha512));
        assert!(matches!(
            ManifestRecord::parse_detect("abc  file"),
            Err(ParseError::UnknownAlgorithm)
        ));
    }

    #[test]
    fn serializes_with_two_spaces() {
        let record = ManifestRecord::parse(&format!("{EMPTY_MD5}  a/b.mov"), DigestAlgorithm::Md5).unwrap();
        assert_eq!(record.serialize(), format!("{EMPTY_MD5}  a/b.mov"));
    }

    #[test]
    fn non_ascii_near_boundary_is_rejected_not_panicking() {
        let line = format!("{}é  file", "a".repeat(31));
        assert!(ManifestRecord::parse(&line, DigestAlgorithm::Md5).is_err());
    }

    fn algorithm_strategy() -> impl Strategy<Value = DigestAlgorithm> {
        prop_oneof![
            Just(DigestAlgorithm::Md5),
            Just(DigestAlgorithm::Sha1),
            Just(DigestAlgorithm::Sha256),
            Just(DigestAlgorithm::Sha512),
        ]
    }

    proptest! {
        #[test]
        fn prop_parse_serialize_round_trip(
            algorithm in algorithm_strategy(),
            seed in "[0-9a-fA-F]{128}",
            path in "[A-Za-z0-9_][A-Za-z0-9_ .-]{0,10}[A-Za-z0-9_](/[A-Za-z0-9_][A-Za-z0-9_.-]{0,10}){0,3}",
        ) {
            let digest = Digest::new(algorithm, &seed[..algorithm.hex_len()]).unwrap();
            let record = ManifestRecord::new(digest, RelativePath::new(&path).unwrap());
            let reparsed = ManifestRecord::parse(&record.serialize(), algorithm).unwrap();
            prop_assert_eq!(reparsed, record);
        }
    }
}
