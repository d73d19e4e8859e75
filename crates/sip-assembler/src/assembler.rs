//! Stage orchestration
//!
//! One [`SipAssembler`] drives one package. Stages run in a fixed order and
//! each one leaves the package in a state the next can rely on:
//!
//! | Stage | Effect |
//! |---|---|
//! | `start` | layout created, identifier events logged |
//! | `merge_transfer_logs` | transfer logs appended to the provenance log |
//! | `consolidate_manifests` | `objects/` then `metadata/` merged into the canonical manifest |
//! | `seal_logs` | checksums of `logs/` appended |
//! | `migrate` | digests substituted with a new algorithm |
//! | `finalize` | canonical manifest sorted, lock file removed |
//!
//! A failing stage stops the run. Earlier stages are not rolled back; a
//! repeated run skips transfer logs already merged and records already
//! present, so it picks up where the failed one stopped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use sip_core::{ObjectEntry, PackageContext, Subtree};
use sip_manifest::{
    relocate_root_manifest, replace_algorithm_from_file, sort, CanonicalManifest, ConsolidationReport,
    ManifestConsolidator, ManifestUpdater, MigrationSummary,
};
use sip_provenance::{consolidate_logs, LogConsolidation, ProvenanceEvent, ProvenanceLog};
use tracing::instrument;

use crate::config::SipConfig;
use crate::error::AssemblerError;

/// Everything a run needs besides configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInputs {
    /// Directory packages are created under
    pub output_dir: PathBuf,
    pub uuid: String,
    pub object_entry: ObjectEntry,
    /// Person or system running the assembly, recorded as `agentName`
    pub agent: Option<String>,
    /// Transfer logs in the order their items were copied
    pub transfer_logs: Vec<PathBuf>,
    /// The package was copied as a whole and carries `objects_manifest.md5`
    /// beside `objects/`
    pub root_copy: bool,
    /// Manifest in a new algorithm to migrate the canonical manifest to
    pub replacement_manifest: Option<PathBuf>,
}

impl PipelineInputs {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, uuid: impl Into<String>, object_entry: ObjectEntry) -> Self {
        Self {
            output_dir: output_dir.into(),
            uuid: uuid.into(),
            object_entry,
            agent: None,
            transfer_logs: Vec::new(),
            root_copy: false,
            replacement_manifest: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_transfer_logs(mut self, logs: Vec<PathBuf>) -> Self {
        self.transfer_logs = logs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_root_copy(mut self, root_copy: bool) -> Self {
        self.root_copy = root_copy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_replacement_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.replacement_manifest = Some(path.into());
        self
    }
}

/// Summary of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub package_root: PathBuf,
    pub canonical_manifest: PathBuf,
    pub provenance_log: PathBuf,
    pub transfer_logs: LogConsolidation,
    pub consolidations: Vec<ConsolidationReport>,
    /// Records appended for files in `logs/`
    pub sealed_records: usize,
    pub migration: Option<MigrationSummary>,
    /// Records in the canonical manifest at the end of the run
    pub final_records: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

/// Drives the stages of one package
#[derive(Debug, Clone)]
pub struct SipAssembler {
    ctx: PackageContext,
    config: SipConfig,
    canonical: CanonicalManifest,
    log: ProvenanceLog,
}

impl SipAssembler {
    #[must_use]
    pub fn new(ctx: PackageContext, config: SipConfig) -> Self {
        let canonical = CanonicalManifest::new(ctx.canonical_manifest_path(), config.default_algorithm);
        let log = ProvenanceLog::new(ctx.provenance_log_path());
        Self {
            ctx,
            config,
            canonical,
            log,
        }
    }

    /// Assembler for the package `inputs` describe
    ///
    /// # Errors
    /// Returns error if the UUID cannot name a package folder
    pub fn for_inputs(inputs: &PipelineInputs, config: SipConfig) -> Result<Self, AssemblerError> {
        let ctx = PackageContext::under(&inputs.output_dir, inputs.object_entry.clone(), &inputs.uuid)?;
        Ok(Self::new(ctx, config))
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &PackageContext {
        &self.ctx
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SipConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn canonical(&self) -> &CanonicalManifest {
        &self.canonical
    }

    #[inline]
    #[must_use]
    pub fn provenance_log(&self) -> &ProvenanceLog {
        &self.log
    }

    /// Run every stage in order
    ///
    /// # Errors
    /// Returns the first stage failure
    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineReport, AssemblerError> {
        let started_at = Local::now();

        self.start(inputs.agent.as_deref())?;
        let transfer_logs = self.merge_transfer_logs(&inputs.transfer_logs)?;
        let consolidations = self.consolidate_manifests(inputs.root_copy)?;
        let sealed_records = if self.config.seal_logs { self.seal_logs()? } else { 0 };
        let migration = inputs
            .replacement_manifest
            .as_deref()
            .map(|replacement| self.migrate(replacement))
            .transpose()?;
        let final_records = self.finalize()?;

        Ok(PipelineReport {
            package_root: self.ctx.root().to_path_buf(),
            canonical_manifest: self.canonical.path().to_path_buf(),
            provenance_log: self.log.path().to_path_buf(),
            transfer_logs,
            consolidations,
            sealed_records,
            migration,
            final_records,
            started_at,
            finished_at: Local::now(),
        })
    }

    /// Create the layout and record who is assembling what
    ///
    /// # Errors
    /// Returns error if folders cannot be created or the log cannot be written
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid()))]
    pub fn start(&self, agent: Option<&str>) -> Result<(), AssemblerError> {
        self.ctx.create_layout()?;

        let mut events = vec![
            ProvenanceEvent::event("sip assembly started"),
            ProvenanceEvent::note(format!("eventDetail=sip-assembler {}", crate::VERSION)),
        ];
        if let Some(agent) = agent {
            events.push(ProvenanceEvent::event(format!("agentName={agent}")));
        }
        events.extend(self.ctx.identifier_events().into_iter().map(ProvenanceEvent::event));
        self.log.record_all(&events)?;

        tracing::info!(root = %self.ctx.root().display(), "package started");
        Ok(())
    }

    /// Append transfer logs to the provenance log, recovering missing ones
    ///
    /// Logs merged by an earlier run are skipped.
    ///
    /// # Errors
    /// Returns error on filesystem failures; missing logs are reported, not
    /// raised
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid(), logs = transfer_logs.len()))]
    pub fn merge_transfer_logs(&self, transfer_logs: &[PathBuf]) -> Result<LogConsolidation, AssemblerError> {
        let policy = self.config.recovery_policy()?;
        let report = consolidate_logs(transfer_logs, &self.log, &policy)?;
        self.log.record_all(&report.events())?;
        if !report.is_complete() {
            tracing::warn!(missing = report.missing().count(), "transfer logs missing");
        }
        for failed in report.failed() {
            tracing::warn!(log = %failed.display(), "transfer did not report success");
        }
        Ok(report)
    }

    /// Consolidate `objects/`, then `metadata/`
    ///
    /// # Errors
    /// Returns the first consolidation failure; a completed `objects/` stays
    /// consolidated
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid()))]
    pub fn consolidate_manifests(&self, root_copy: bool) -> Result<Vec<ConsolidationReport>, AssemblerError> {
        if root_copy {
            relocate_root_manifest(&self.ctx, &self.log)?;
        }
        let consolidator = ManifestConsolidator::new(&self.ctx, &self.canonical, &self.log)
            .with_strip_prefix(self.config.strip_prefix_path()?);

        let mut reports = Vec::with_capacity(2);
        for subtree in [Subtree::Objects, Subtree::Metadata] {
            reports.push(consolidator.consolidate(subtree)?);
        }
        Ok(reports)
    }

    /// Append checksums of everything in `logs/` except the live provenance log
    ///
    /// Files sealed by an earlier run are skipped. Returns the number of
    /// records appended.
    ///
    /// # Errors
    /// Returns error if a sealed file changed since or a file cannot be hashed
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid()))]
    pub fn seal_logs(&self) -> Result<usize, AssemblerError> {
        let records = ManifestUpdater::new(&self.canonical, &self.log).seal_directory(&self.ctx.logs_dir())?;
        Ok(records.len())
    }

    /// Substitute every digest with its counterpart in `replacement`
    ///
    /// # Errors
    /// Returns error if `replacement` is absent or its paths diverge from the
    /// canonical manifest
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid(), replacement = %replacement.display()))]
    pub fn migrate(&self, replacement: &Path) -> Result<MigrationSummary, AssemblerError> {
        if !replacement.is_file() {
            return Err(AssemblerError::MissingReplacement(replacement.to_path_buf()));
        }
        Ok(replace_algorithm_from_file(&self.canonical, replacement, &self.log)?)
    }

    /// Sort the canonical manifest if configured and close the log
    ///
    /// The hidden lock file beside the canonical manifest is removed, leaving
    /// only the deliverable. Returns the number of records in the final
    /// manifest.
    ///
    /// # Errors
    /// Returns error if the manifest cannot be rewritten or read
    #[instrument(skip_all, fields(uuid = %self.ctx.uuid()))]
    pub fn finalize(&self) -> Result<usize, AssemblerError> {
        let records = if self.config.sort_on_finalize {
            sort(&self.canonical)?
        } else {
            self.canonical.load()?.len()
        };
        self.log.record(&ProvenanceEvent::event("sip assembly finished"))?;
        self.canonical.remove_lock_file()?;
        tracing::info!(records, canonical = %self.canonical.path().display(), "package finalized");
        Ok(records)
    }
}
