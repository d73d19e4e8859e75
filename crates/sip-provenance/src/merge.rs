//! Transfer-log consolidation
//!
//! Appends each per-item transfer log to the package provenance log in the
//! order the items were processed. A missing log is not fatal: the recovery
//! policy gets one chance to find the authoritative replacement, otherwise
//! the item is reported missing and the remaining logs are still merged.
//!
//! Once [`LogConsolidation::events`] are recorded in the destination, a later
//! consolidation into the same destination skips those logs.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ProvenanceError;
use crate::event::ProvenanceEvent;
use crate::log::ProvenanceLog;
use crate::recovery::{LogName, RecoveryPolicy};

/// Outcome a transfer log reports for its own copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferVerdict {
    Success,
    Failure,
    /// Destination already held a manifest; files may be partially copied
    PartialFailure,
    /// No judgement line in the log
    Unknown,
}

impl TransferVerdict {
    const SUCCESS: &'static str = "EVENT = File Transfer Judgement - Success";
    const FAILURE: &'static str = "EVENT = File Transfer Outcome - Failure";
    const PARTIAL: &'static str = "EVENT = Existing destination manifest check - Failure";

    /// Verdict of a transfer log's text; the last judgement line wins
    #[must_use]
    pub fn analyze(text: &str) -> Self {
        text.lines().fold(Self::Unknown, |verdict, line| {
            if line.contains(Self::PARTIAL) {
                Self::PartialFailure
            } else if line.contains(Self::FAILURE) {
                Self::Failure
            } else if line.contains(Self::SUCCESS) {
                Self::Success
            } else {
                verdict
            }
        })
    }
}

impl Display for TransferVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::PartialFailure => "failure - might be partially transferred",
            Self::Unknown => "unknown",
        })
    }
}

/// What happened to one expected log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogOutcome {
    /// Found at the expected path
    Merged {
        path: PathBuf,
        lines: usize,
        verdict: TransferVerdict,
    },
    /// Replaced by a more recent log from the fallback directory
    Recovered {
        expected: PathBuf,
        replacement: PathBuf,
        lines: usize,
        verdict: TransferVerdict,
    },
    /// Merged into the destination by an earlier consolidation
    AlreadyMerged { path: PathBuf },
    /// Neither the expected log nor a replacement exists
    Missing { expected: PathBuf },
}

impl LogOutcome {
    #[inline]
    #[must_use]
    pub fn lines(&self) -> usize {
        match self {
            Self::Merged { lines, .. } | Self::Recovered { lines, .. } => *lines,
            Self::AlreadyMerged { .. } | Self::Missing { .. } => 0,
        }
    }

    /// Path the log was expected at
    #[must_use]
    pub fn expected(&self) -> &Path {
        match self {
            Self::Merged { path, .. } | Self::AlreadyMerged { path } => path,
            Self::Recovered { expected, .. } | Self::Missing { expected } => expected,
        }
    }

    /// Verdict of the merged content, if any was merged by this run
    #[must_use]
    pub fn verdict(&self) -> Option<TransferVerdict> {
        match self {
            Self::Merged { verdict, .. } | Self::Recovered { verdict, .. } => Some(*verdict),
            Self::AlreadyMerged { .. } | Self::Missing { .. } => None,
        }
    }
}

/// Result of [`consolidate_logs`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogConsolidation {
    pub destination: PathBuf,
    pub outcomes: Vec<LogOutcome>,
}

impl LogConsolidation {
    /// Total lines appended to the destination
    #[must_use]
    pub fn lines_written(&self) -> usize {
        self.outcomes.iter().map(LogOutcome::lines).sum()
    }

    /// Expected paths for which no log was found
    pub fn missing(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            LogOutcome::Missing { expected } => Some(expected.as_path()),
            _ => None,
        })
    }

    pub fn recovered(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            LogOutcome::Recovered {
                expected,
                replacement,
                ..
            } => Some((expected.as_path(), replacement.as_path())),
            _ => None,
        })
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().next().is_none()
    }

    /// Provenance events for every item merged or not found by this run
    ///
    /// Merged and recovered items get a [`ProvenanceEvent::log_merged`]
    /// marker that later consolidations recognise.
    #[must_use]
    pub fn events(&self) -> Vec<ProvenanceEvent> {
        let mut events = Vec::with_capacity(self.outcomes.len());
        for outcome in &self.outcomes {
            match outcome {
                LogOutcome::Merged { path, .. } => {
                    events.push(ProvenanceEvent::log_merged(path, &self.destination));
                }
                LogOutcome::Recovered {
                    expected,
                    replacement,
                    ..
                } => {
                    events.push(ProvenanceEvent::log_recovered(expected, replacement));
                    events.push(ProvenanceEvent::log_merged(expected, &self.destination));
                }
                LogOutcome::AlreadyMerged { .. } => {}
                LogOutcome::Missing { expected } => events.push(ProvenanceEvent::log_missing(expected)),
            }
        }
        events
    }

    /// One line per item: the item name padded to 50 columns, then its
    /// transfer verdict
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|outcome| {
                let expected = outcome.expected();
                let item = LogName::from_path(expected).map_or_else(
                    || expected.display().to_string(),
                    |name| name.prefix().to_string(),
                );
                let status = match outcome {
                    LogOutcome::AlreadyMerged { .. } => "already merged".to_string(),
                    LogOutcome::Missing { .. } => "missing".to_string(),
                    LogOutcome::Merged { verdict, .. } | LogOutcome::Recovered { verdict, .. } => {
                        verdict.to_string()
                    }
                };
                format!("{item:<50}   : {status}")
            })
            .collect()
    }

    /// Items whose transfer did not end in success
    pub fn failed(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.verdict(), Some(verdict) if verdict != TransferVerdict::Success))
            .map(LogOutcome::expected)
    }
}

/// Merge `log_paths`, in order, into `destination`
///
/// Only input lines are written; [`LogConsolidation::events`] renders the
/// outcomes for callers that want them in the provenance log. An input whose
/// merge marker is already in `destination` is reported
/// [`LogOutcome::AlreadyMerged`] and not appended again.
///
/// # Errors
/// Returns error on filesystem failures other than the absence of an input log
pub fn consolidate_logs<P: AsRef<Path>>(
    log_paths: &[P],
    destination: &ProvenanceLog,
    policy: &RecoveryPolicy,
) -> Result<LogConsolidation, ProvenanceError> {
    let mut report = LogConsolidation {
        destination: destination.path().to_path_buf(),
        outcomes: Vec::with_capacity(log_paths.len()),
    };

    let recorded: HashSet<String> = destination
        .lines()?
        .into_iter()
        .filter_map(|line| {
            line.find(ProvenanceEvent::PREFIX)
                .map(|start| line[start..].to_string())
        })
        .collect();

    for expected in log_paths {
        let expected = expected.as_ref();
        let marker = ProvenanceEvent::log_merged(expected, destination.path()).to_string();
        let outcome = if recorded.contains(&marker) {
            tracing::info!(path = %expected.display(), "transfer log already merged, skipping");
            LogOutcome::AlreadyMerged {
                path: expected.to_path_buf(),
            }
        } else if expected.is_file() {
            let (lines, verdict) = merge_one(expected, destination)?;
            tracing::debug!(path = %expected.display(), lines, %verdict, "merged transfer log");
            LogOutcome::Merged {
                path: expected.to_path_buf(),
                lines,
                verdict,
            }
        } else if let Some(replacement) = policy.find_replacement(expected)? {
            tracing::info!(
                expected = %expected.display(),
                replacement = %replacement.display(),
                "transfer log recovered from fallback directory"
            );
            let (lines, verdict) = merge_one(&replacement, destination)?;
            LogOutcome::Recovered {
                expected: expected.to_path_buf(),
                replacement,
                lines,
                verdict,
            }
        } else {
            tracing::warn!(expected = %expected.display(), "transfer log missing, skipping");
            LogOutcome::Missing {
                expected: expected.to_path_buf(),
            }
        };
        report.outcomes.push(outcome);
    }

    Ok(report)
}

fn merge_one(source: &Path, destination: &ProvenanceLog) -> Result<(usize, TransferVerdict), ProvenanceError> {
    let text = fs::read_to_string(source).map_err(|err| {
        if err.kind() == std::io::ErrorKind::InvalidData {
            ProvenanceError::NotText(source.to_path_buf())
        } else {
            ProvenanceError::Io {
                path: source.to_path_buf(),
                source: err,
            }
        }
    })?;
    destination.append_text(&text)?;
    Ok((text.lines().count(), TransferVerdict::analyze(&text)))
}
