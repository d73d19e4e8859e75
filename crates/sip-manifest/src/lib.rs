//! SIP Manifest
//!
//! Fixed-format checksum manifests and the operations that keep one
//! canonical manifest per package truthful while payload moves, digests
//! change algorithm and late files appear.
//!
//! # Core Concepts
//!
//! - [`ManifestRecord`]: `<hex digest>  <relative/path>`, split at the
//!   algorithm's digest length
//! - [`CanonicalManifest`]: the package-wide manifest, mutated only under an
//!   exclusive lock with an atomic replace
//! - [`ManifestConsolidator`]: merges per-source manifests, rebasing paths
//!   onto `<uuid>/<subtree>/`, and archives them into `logs/`
//! - [`replace_algorithm`]: swaps every digest for its counterpart in a new
//!   algorithm, refusing divergent record sets
//! - [`ManifestUpdater`]: appends checksums of files created afterwards
//! - [`sort`]: final byte-wise ordering
//!
//! # Example
//!
//! ```rust,ignore
//! use sip_core::Subtree;
//! use sip_manifest::{consolidate, sort, CanonicalManifest};
//! use sip_provenance::ProvenanceLog;
//!
//! let log = ProvenanceLog::new(ctx.provenance_log_path());
//! consolidate(&ctx, Subtree::Objects, &log)?;
//! consolidate(&ctx, Subtree::Metadata, &log)?;
//!
//! let canonical = CanonicalManifest::for_package(&ctx);
//! let records = sort(&canonical)?;
//! println!("{records} records in {}", canonical.path().display());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod algorithm;
mod consolidate;
mod digest;
mod error;
mod hasher;
mod manifest;
mod migrate;
mod normalize;
mod path;
mod record;
mod store;
mod update;
mod verify;

pub use algorithm::DigestAlgorithm;
pub use consolidate::{
    consolidate, relocate_root_manifest, ArchivedManifest, ConsolidationReport, DiscoveredManifest,
    ManifestConsolidator, RewrittenManifest, ROOT_OBJECTS_MANIFEST,
};
pub use digest::Digest;
pub use error::{ManifestError, ParseError};
pub use hasher::{FileHasher, StreamingHasher};
pub use manifest::Manifest;
pub use migrate::{replace_algorithm, replace_algorithm_from_file, MigrationSummary};
pub use normalize::{normalize, sort};
pub use path::{PathError, RelativePath};
pub use record::{ManifestRecord, SEPARATOR};
pub use store::CanonicalManifest;
pub use update::ManifestUpdater;
pub use verify::{verify, VerificationReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
