//! Provenance events
//!
//! Structured events carry the `EVENT = ` prefix. Consumers only rely on
//! that prefix; the remainder of the line is free text.

use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// One line of provenance detail, without its timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceEvent {
    /// Structured event, rendered as `EVENT = <detail>`
    Event(String),
    /// Free-text annotation
    Note(String),
}

impl ProvenanceEvent {
    /// Prefix that marks a structured event
    pub const PREFIX: &'static str = "EVENT = ";

    #[inline]
    #[must_use]
    pub fn event(detail: impl Into<String>) -> Self {
        Self::Event(detail.into())
    }

    #[inline]
    #[must_use]
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note(text.into())
    }

    /// Checksums of `source` were merged into `canonical`
    #[must_use]
    pub fn manifest_consolidation(source: &Path, canonical: &Path) -> Self {
        Self::event(format!(
            "Manifest consolidation - Checksums from {} merged into {}",
            source.display(),
            canonical.display()
        ))
    }

    /// Superseded manifest moved from `source` into `destination`
    #[must_use]
    pub fn manifest_movement(source: &Path, destination: &Path) -> Self {
        Self::event(format!(
            "Manifest movement - Manifest from {} to {}",
            source.display(),
            destination.display()
        ))
    }

    /// Digests of `canonical` substituted with a new algorithm
    #[must_use]
    pub fn checksum_migration(from: &str, to: &str, updated: usize, canonical: &Path) -> Self {
        Self::event(format!(
            "Checksum migration - {from} to {to}, {updated} records updated in {}",
            canonical.display()
        ))
    }

    /// Checksum of a file created after consolidation appended to `canonical`
    #[must_use]
    pub fn manifest_update(file: &Path, canonical: &Path) -> Self {
        Self::event(format!(
            "Manifest update - checksum for {} appended to {}",
            file.display(),
            canonical.display()
        ))
    }

    /// Expected transfer log replaced by a more recent one
    #[must_use]
    pub fn log_recovered(expected: &Path, replacement: &Path) -> Self {
        Self::event(format!(
            "Log consolidation - {} not found, using {}",
            expected.display(),
            replacement.display()
        ))
    }

    /// Transfer log expected at `expected` appended to `destination`
    ///
    /// Its presence in the destination marks the log as merged.
    #[must_use]
    pub fn log_merged(expected: &Path, destination: &Path) -> Self {
        Self::event(format!(
            "Log consolidation - Transfer log {} merged into {}",
            expected.display(),
            destination.display()
        ))
    }

    /// No log could be found for an item
    #[must_use]
    pub fn log_missing(expected: &Path) -> Self {
        Self::event(format!(
            "Log consolidation - {} not found, no replacement available",
            expected.display()
        ))
    }

    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Event(_))
    }
}

impl Display for ProvenanceEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(detail) => write!(f, "{}{detail}", Self::PREFIX),
            Self::Note(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_events_carry_prefix() {
        let event = ProvenanceEvent::manifest_movement(Path::new("/a/x.md5"), Path::new("/a/logs"));
        assert_eq!(
            event.to_string(),
            "EVENT = Manifest movement - Manifest from /a/x.md5 to /a/logs"
        );
        assert!(event.is_structured());
    }

    #[test]
    fn notes_are_verbatim() {
        let note = ProvenanceEvent::note("Command line arguments: -i foo");
        assert_eq!(note.to_string(), "Command line arguments: -i foo");
        assert!(!note.is_structured());
    }

    #[test]
    fn migration_event_names_both_algorithms() {
        let event = ProvenanceEvent::checksum_migration("md5", "sha512", 3, Path::new("m.md5"));
        let text = event.to_string();
        assert!(text.contains("md5 to sha512"));
        assert!(text.contains("3 records updated"));
    }
}
