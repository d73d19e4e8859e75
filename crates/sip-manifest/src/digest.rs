//! Hex digests

use std::fmt::{self, Display, Formatter};

use crate::algorithm::DigestAlgorithm;
use crate::error::ParseError;

/// A hexadecimal digest of a known algorithm
///
/// The text is kept exactly as read so a rewritten manifest reproduces the
/// original digest byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    /// Validate `hex` against the algorithm's length and alphabet
    ///
    /// # Errors
    /// Returns error if the length is wrong or a character is not hexadecimal
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Result<Self, ParseError> {
        let hex = hex.into();
        if hex.len() != algorithm.hex_len() {
            return Err(ParseError::DigestLength {
                algorithm,
                expected: algorithm.hex_len(),
                actual: hex.len(),
            });
        }
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::InvalidHex(hex));
        }
        Ok(Self { algorithm, hex })
    }

    /// Encode raw digest bytes as lowercase hex
    ///
    /// # Errors
    /// Returns error if the byte count does not match the algorithm
    pub fn from_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> Result<Self, ParseError> {
        Self::new(algorithm, hex::encode(bytes))
    }

    #[inline]
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Compare digests ignoring hex case
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.hex.eq_ignore_ascii_case(&other.hex)
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}
