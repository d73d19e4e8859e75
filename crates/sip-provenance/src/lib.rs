//! SIP Provenance
//!
//! The audit trail of a package: a plain-text provenance log written one
//! timestamped line at a time, and the consolidation of per-transfer logs
//! into that log.
//!
//! # Core Concepts
//!
//! - [`ProvenanceEvent`]: one line of audit detail, `EVENT = ...` or free text
//! - [`ProvenanceLog`]: append-only log file guarded by an advisory lock
//! - [`consolidate_logs`]: merge transfer logs in the order items were processed
//! - [`RecoveryPolicy`]: find the authoritative log when the expected one is gone
//! - [`TransferVerdict`]: what a transfer log says about its own copy
//!
//! # Example
//!
//! ```rust,ignore
//! use sip_provenance::{consolidate_logs, ProvenanceLog, RecoveryPolicy};
//!
//! let log = ProvenanceLog::new(ctx.provenance_log_path());
//! let policy = RecoveryPolicy::new("/home/user/Desktop/moveit_logs");
//! let merged = consolidate_logs(&transfer_logs, &log, &policy)?;
//! for missing in merged.missing() {
//!     eprintln!("no log for {}", missing.display());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod event;
mod log;
mod merge;
mod recovery;

pub use error::ProvenanceError;
pub use event::ProvenanceEvent;
pub use log::ProvenanceLog;
pub use merge::{consolidate_logs, LogConsolidation, LogOutcome, TransferVerdict};
pub use recovery::{LogName, RecoveryPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
