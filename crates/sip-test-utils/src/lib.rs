//! Testing utilities for SIP workspace
//!
//! Shared package fixtures on temporary directories.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use sip_core::{ObjectEntry, PackageContext, Subtree};
use tempfile::TempDir;

/// MD5 of the empty byte string
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// MD5 of `b"abc"`
pub const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";

/// SHA-512 of the empty byte string
pub const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

/// A package laid out under a temporary output directory
///
/// The directory is removed when the fixture drops.
#[derive(Debug)]
pub struct PackageFixture {
    output: TempDir,
    ctx: PackageContext,
}

impl PackageFixture {
    /// Package `<tmp>/oe1234/<uuid>` with `objects/`, `metadata/` and `logs/`
    pub fn new(uuid: &str) -> Self {
        Self::with_object_entry(uuid, ObjectEntry::Number("oe1234".to_string()))
    }

    pub fn with_object_entry(uuid: &str, object_entry: ObjectEntry) -> Self {
        let output = tempfile::tempdir().unwrap();
        let ctx = PackageContext::under(output.path(), object_entry, uuid).unwrap();
        ctx.create_layout().unwrap();
        Self { output, ctx }
    }

    pub fn ctx(&self) -> &PackageContext {
        &self.ctx
    }

    /// Output directory the package lives under
    pub fn output(&self) -> &Path {
        self.output.path()
    }

    /// Write a payload file under a subtree, creating parent folders
    pub fn write_file(&self, subtree: Subtree, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.ctx.subtree_dir(subtree).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Write a manifest file named `name` directly in a subtree folder
    pub fn write_manifest(&self, subtree: Subtree, name: &str, records: &[(&str, &str)]) -> PathBuf {
        let text: String = records.iter().map(|(digest, path)| manifest_line(digest, path)).collect();
        self.write_file(subtree, name, text.as_bytes())
    }

    /// Write a file outside the package, under the output directory
    pub fn write_outside(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.output.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn canonical_text(&self) -> String {
        fs::read_to_string(self.ctx.canonical_manifest_path()).unwrap_or_default()
    }

    pub fn provenance_lines(&self) -> Vec<String> {
        fs::read_to_string(self.ctx.provenance_log_path())
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// File names currently in `logs/`, sorted
    pub fn logs_listing(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.ctx.logs_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// `<digest>  <path>\n`
pub fn manifest_line(digest: &str, path: &str) -> String {
    format!("{digest}  {path}\n")
}
