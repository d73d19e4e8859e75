//! Append-only provenance log file

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use fs2::FileExt;

use crate::error::ProvenanceError;
use crate::event::ProvenanceEvent;

/// Timestamp prefix written before each recorded event
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Package provenance log
///
/// Each write is one `write_all` on an append handle held under an exclusive
/// advisory lock, so concurrent writers never interleave within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceLog {
    path: PathBuf,
}

impl ProvenanceLog {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped event line
    ///
    /// # Errors
    /// Returns error if the log cannot be opened, locked or written
    pub fn record(&self, event: &ProvenanceEvent) -> Result<(), ProvenanceError> {
        let line = format!("{} {event}\n", Local::now().format(TIMESTAMP_FORMAT));
        self.append_bytes(line.as_bytes())
    }

    /// Append several events in one write
    ///
    /// # Errors
    /// Returns error if the log cannot be opened, locked or written
    pub fn record_all<'a>(
        &self,
        events: impl IntoIterator<Item = &'a ProvenanceEvent>,
    ) -> Result<(), ProvenanceError> {
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let text: String = events
            .into_iter()
            .map(|event| format!("{stamp} {event}\n"))
            .collect();
        if text.is_empty() {
            return Ok(());
        }
        self.append_bytes(text.as_bytes())
    }

    /// Append text verbatim, terminating it with a newline if needed
    ///
    /// # Errors
    /// Returns error if the log cannot be opened, locked or written
    pub fn append_text(&self, text: &str) -> Result<(), ProvenanceError> {
        if text.is_empty() {
            return Ok(());
        }
        if text.ends_with('\n') {
            self.append_bytes(text.as_bytes())
        } else {
            let mut owned = String::with_capacity(text.len() + 1);
            owned.push_str(text);
            owned.push('\n');
            self.append_bytes(owned.as_bytes())
        }
    }

    /// All lines currently in the log; an absent log has none
    ///
    /// # Errors
    /// Returns error if the log exists but cannot be read
    pub fn lines(&self) -> Result<Vec<String>, ProvenanceError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                Err(ProvenanceError::NotText(self.path.clone()))
            }
            Err(err) => Err(ProvenanceError::Io {
                path: self.path.clone(),
                source: err,
            }),
        }
    }

    fn append_bytes(&self, bytes: &[u8]) -> Result<(), ProvenanceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(ProvenanceError::io(&self.path))?;
        file.lock_exclusive().map_err(ProvenanceError::io(&self.path))?;
        file.write_all(bytes).map_err(ProvenanceError::io(&self.path))?;
        file.flush().map_err(ProvenanceError::io(&self.path))?;
        // Closing the handle releases the lock
        drop(file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_timestamped_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ProvenanceLog::new(tmp.path().join("sip.log"));

        log.record(&ProvenanceEvent::event("sipcreator started")).unwrap();
        log.record(&ProvenanceEvent::note("eventDetail=test")).unwrap();

        let lines = log.lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" EVENT = sipcreator started"));
        assert!(lines[1].ends_with(" eventDetail=test"));
        // `YYYY-MM-DDTHH:MM:SS ` prefix
        assert_eq!(lines[0].as_bytes()[10], b'T');
        assert_eq!(lines[0].as_bytes()[19], b' ');
    }

    #[test]
    fn append_text_terminates_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ProvenanceLog::new(tmp.path().join("sip.log"));

        log.append_text("first\nsecond").unwrap();
        log.append_text("third\n").unwrap();
        log.append_text("").unwrap();

        assert_eq!(log.lines().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn record_all_writes_every_event() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ProvenanceLog::new(tmp.path().join("sip.log"));
        let events = vec![ProvenanceEvent::event("a"), ProvenanceEvent::event("b")];

        log.record_all(&events).unwrap();
        log.record_all(std::iter::empty()).unwrap();

        let lines = log.lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("EVENT = b"));
    }

    #[test]
    fn missing_log_has_no_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ProvenanceLog::new(tmp.path().join("absent.log"));
        assert!(log.lines().unwrap().is_empty());
    }
}
