//! SIP Core
//!
//! Package context shared by every stage that touches a Submission
//! Information Package.
//!
//! # Core Concepts
//!
//! - [`PackageContext`]: package root, UUID and object entry, threaded
//!   explicitly into every manifest and log operation
//! - [`ObjectEntry`]: archival accession identifier (`oe1234`)
//! - [`Subtree`]: the fixed `objects/`, `metadata/` and `logs/` folders
//!
//! # Example
//!
//! ```rust,ignore
//! use sip_core::{ObjectEntry, PackageContext};
//!
//! let entry: ObjectEntry = "oe4567".parse()?;
//! let ctx = PackageContext::under("/mnt/sips", entry, "0b6e...")?;
//! ctx.create_layout()?;
//!
//! println!("canonical manifest: {}", ctx.canonical_manifest_path().display());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod context;
mod error;
mod layout;
mod object_entry;

pub use context::PackageContext;
pub use error::ContextError;
pub use layout::Subtree;
pub use object_entry::{ObjectEntry, ObjectEntryError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn context_and_layout_integration() {
        let tmp = tempfile::tempdir().unwrap();
        let entry: ObjectEntry = "oe1234".parse().unwrap();
        let ctx = PackageContext::under(tmp.path(), entry, "1234-uuid").unwrap();
        ctx.create_layout().unwrap();

        for subtree in Subtree::ALL {
            assert!(ctx.subtree_dir(subtree).is_dir());
        }
        assert_eq!(
            ctx.canonical_manifest_path(),
            tmp.path().join("oe1234").join("1234-uuid_manifest.md5")
        );
    }
}
