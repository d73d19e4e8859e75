//! In-memory manifests

use std::fs;
use std::path::Path;

use crate::algorithm::DigestAlgorithm;
use crate::error::{ManifestError, ParseError};
use crate::path::RelativePath;
use crate::record::ManifestRecord;

/// Ordered records sharing one algorithm
///
/// Order is insertion order until the manifest is normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: DigestAlgorithm,
    records: Vec<ManifestRecord>,
}

impl Manifest {
    #[inline]
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            records: Vec::new(),
        }
    }

    /// Build from records, checking they all use `algorithm`
    ///
    /// # Errors
    /// Returns error if a record has a different algorithm
    pub fn from_records(
        algorithm: DigestAlgorithm,
        records: impl IntoIterator<Item = ManifestRecord>,
    ) -> Result<Self, ManifestError> {
        let mut manifest = Self::new(algorithm);
        manifest.extend(records)?;
        Ok(manifest)
    }

    /// Parse manifest text, detecting the algorithm from the first record
    ///
    /// Text without any record yields an empty manifest of `fallback`.
    /// `source` only labels errors.
    ///
    /// # Errors
    /// Returns error naming the first malformed line
    pub fn parse(text: &str, fallback: DigestAlgorithm, source: &Path) -> Result<Self, ManifestError> {
        let first = text
            .lines()
            .enumerate()
            .find(|(_, line)| !line.trim().is_empty());
        let algorithm = match first {
            None => fallback,
            Some((index, line)) => ManifestRecord::detect_algorithm(line).ok_or_else(|| {
                ManifestError::Parse {
                    path: source.to_path_buf(),
                    line: index + 1,
                    source: ParseError::UnknownAlgorithm,
                }
            })?,
        };
        Self::parse_as(text, algorithm, source)
    }

    /// Parse manifest text written with a known algorithm
    ///
    /// # Errors
    /// Returns error naming the first malformed line
    pub fn parse_as(text: &str, algorithm: DigestAlgorithm, source: &Path) -> Result<Self, ManifestError> {
        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = ManifestRecord::parse(line, algorithm).map_err(|source_err| ManifestError::Parse {
                path: source.to_path_buf(),
                line: index + 1,
                source: source_err,
            })?;
            records.push(record);
        }
        Ok(Self { algorithm, records })
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is malformed
    pub fn read(path: &Path, fallback: DigestAlgorithm) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(ManifestError::io(path))?;
        Self::parse(&text, fallback, path)
    }

    /// Serialized form, one newline-terminated line per record
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.records.len() * (self.algorithm.hex_len() + 32));
        for record in &self.records {
            text.push_str(&record.serialize());
            text.push('\n');
        }
        text
    }

    #[inline]
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    #[inline]
    pub fn records_mut(&mut self) -> &mut [ManifestRecord] {
        &mut self.records
    }

    #[inline]
    #[must_use]
    pub fn into_records(self) -> Vec<ManifestRecord> {
        self.records
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.records.iter().map(|record| &record.path)
    }

    /// Last record written for `path`
    #[must_use]
    pub fn get(&self, path: &RelativePath) -> Option<&ManifestRecord> {
        self.records.iter().rev().find(|record| &record.path == path)
    }

    #[inline]
    #[must_use]
    pub fn contains_path(&self, path: &RelativePath) -> bool {
        self.get(path).is_some()
    }

    /// Append one record
    ///
    /// # Errors
    /// Returns error if the record's algorithm differs from the manifest's
    pub fn push(&mut self, record: ManifestRecord) -> Result<(), ManifestError> {
        if record.algorithm() != self.algorithm {
            return Err(ManifestError::AlgorithmMismatch {
                expected: self.algorithm,
                found: record.algorithm(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Append records in order, stopping at the first algorithm mismatch
    ///
    /// # Errors
    /// Returns error if a record's algorithm differs from the manifest's
    pub fn extend(&mut self, records: impl IntoIterator<Item = ManifestRecord>) -> Result<(), ManifestError> {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Replace the whole content, switching algorithm
    pub(crate) fn replace(&mut self, algorithm: DigestAlgorithm, records: Vec<ManifestRecord>) {
        self.algorithm = algorithm;
        self.records = records;
    }
}
