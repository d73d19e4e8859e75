//! SIP Assembler
//!
//! Runs the manifest and provenance stages of assembling one Submission
//! Information Package, driven by a small TOML configuration.
//!
//! # Core Concepts
//!
//! - [`SipConfig`]: defaults for algorithm, path rewriting, log recovery
//!   and the optional stages
//! - [`SipAssembler`]: one package, one context, stages in a fixed order
//! - [`PipelineReport`]: serializable outcome of a full run
//!
//! # Example
//!
//! ```rust,ignore
//! use sip_assembler::{PipelineInputs, SipAssembler, SipConfig};
//!
//! let config = SipConfig::load("sip.toml".as_ref())?;
//! let inputs = PipelineInputs::new("/mnt/sips", uuid, "oe4567".parse()?)
//!     .with_agent("archivist")
//!     .with_transfer_logs(logs);
//!
//! let report = SipAssembler::for_inputs(&inputs, config)?.run(&inputs)?;
//! println!("{} records in {}", report.final_records, report.canonical_manifest.display());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod assembler;
mod config;
mod error;

pub use assembler::{PipelineInputs, PipelineReport, SipAssembler};
pub use config::SipConfig;
pub use error::AssemblerError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
