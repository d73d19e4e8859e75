//! `sip` - manifest and provenance operations on archival packages

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use sip_assembler::{PipelineInputs, SipAssembler, SipConfig};
use sip_core::{ObjectEntry, PackageContext, Subtree};
use sip_manifest::{
    relocate_root_manifest, replace_algorithm_from_file, sort, verify, CanonicalManifest, Digest,
    ManifestConsolidator, ManifestUpdater, StreamingHasher,
};
use sip_provenance::{consolidate_logs, ProvenanceLog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(&cli().get_matches()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Command {
    let manifest_arg = || {
        Arg::new("manifest")
            .long("manifest")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Canonical manifest file")
    };
    let log_arg = || {
        Arg::new("log")
            .long("log")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Provenance log events are appended to")
    };
    let object_entry_arg = || {
        Arg::new("object-entry")
            .long("object-entry")
            .default_value(ObjectEntry::NOT_APPLICABLE)
            .help("Accession number such as oe4567, or not_applicable")
    };

    Command::new("sip")
        .version(sip_assembler::VERSION)
        .about("Checksum manifest and provenance log consolidation for archival SIPs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print reports as JSON"),
        )
        .subcommand(
            Command::new("consolidate")
                .about("Merge subtree manifests into the canonical manifest")
                .arg(
                    Arg::new("package")
                        .long("package")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Package root, named after its UUID"),
                )
                .arg(object_entry_arg())
                .arg(
                    Arg::new("subtree")
                        .long("subtree")
                        .action(ArgAction::Append)
                        .help("objects or metadata; both when omitted"),
                )
                .arg(
                    Arg::new("root-copy")
                        .long("root-copy")
                        .action(ArgAction::SetTrue)
                        .help("Move objects_manifest.md5 from the package root into objects/ first"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Replace every digest with its counterpart in another algorithm")
                .arg(manifest_arg())
                .arg(log_arg())
                .arg(
                    Arg::new("replacement")
                        .long("replacement")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Manifest with the new digests"),
                ),
        )
        .subcommand(
            Command::new("append")
                .about("Append checksums of files or directories created after consolidation")
                .arg(manifest_arg())
                .arg(log_arg())
                .arg(
                    Arg::new("digest")
                        .long("digest")
                        .help("Precomputed digest; only with a single file"),
                )
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Files or directories to append"),
                ),
        )
        .subcommand(
            Command::new("sort")
                .about("Sort the canonical manifest by path")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("merge-logs")
                .about("Append transfer logs to a provenance log")
                .arg(log_arg())
                .arg(
                    Arg::new("fallback-dir")
                        .long("fallback-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Where to look for logs missing from their expected path"),
                )
                .arg(
                    Arg::new("inputs")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Transfer logs in processing order"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Re-hash every recorded file")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("assemble")
                .about("Run every stage for one package")
                .arg(
                    Arg::new("output")
                        .long("output")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory packages are created under"),
                )
                .arg(Arg::new("uuid").long("uuid").required(true).help("Package UUID"))
                .arg(object_entry_arg())
                .arg(Arg::new("agent").long("agent").help("Recorded as agentName"))
                .arg(
                    Arg::new("transfer-log")
                        .long("transfer-log")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Transfer log, repeatable, in processing order"),
                )
                .arg(
                    Arg::new("root-copy")
                        .long("root-copy")
                        .action(ArgAction::SetTrue)
                        .help("Package carries objects_manifest.md5 at its root"),
                )
                .arg(
                    Arg::new("replacement")
                        .long("replacement")
                        .value_parser(value_parser!(PathBuf))
                        .help("Manifest to migrate the canonical manifest to"),
                ),
        )
}

/// Execute the selected command; `Ok(false)` means it ran but found problems
fn run(matches: &ArgMatches) -> Result<bool> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SipConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SipConfig::default(),
    };
    tracing::debug!(?config, "configuration loaded");
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("consolidate", args)) => {
            let root = required::<PathBuf>(args, "package")?;
            let ctx = PackageContext::new(root, object_entry(args)?)?;
            let canonical = CanonicalManifest::new(ctx.canonical_manifest_path(), config.default_algorithm);
            let log = ProvenanceLog::new(ctx.provenance_log_path());
            if args.get_flag("root-copy") {
                relocate_root_manifest(&ctx, &log)?;
            }
            let consolidator = ManifestConsolidator::new(&ctx, &canonical, &log)
                .with_strip_prefix(config.strip_prefix_path()?);

            let mut reports = Vec::new();
            for subtree in subtrees(args)? {
                reports.push(consolidator.consolidate(subtree)?);
            }
            emit(json, &reports, || {
                for report in &reports {
                    println!(
                        "{}: {} manifests, {} records appended, {} already present",
                        report.subtree,
                        report.manifests.len(),
                        report.records_appended,
                        report.records_already_present
                    );
                }
            })?;
            Ok(true)
        }
        Some(("migrate", args)) => {
            let canonical = canonical(args, &config)?;
            let log = ProvenanceLog::new(required::<PathBuf>(args, "log")?);
            let replacement = required::<PathBuf>(args, "replacement")?;
            let summary = replace_algorithm_from_file(&canonical, replacement, &log)?;
            emit(json, &summary, || {
                println!(
                    "{} to {}: {} records updated in {}",
                    summary.from,
                    summary.to,
                    summary.records_updated,
                    summary.canonical.display()
                );
            })?;
            Ok(true)
        }
        Some(("append", args)) => {
            let canonical = canonical(args, &config)?;
            let log = ProvenanceLog::new(required::<PathBuf>(args, "log")?);
            let paths: Vec<PathBuf> = args.get_many::<PathBuf>("paths").into_iter().flatten().cloned().collect();
            let updater = ManifestUpdater::new(&canonical, &log);

            let records = match args.get_one::<String>("digest") {
                Some(hex) => {
                    let [file] = paths.as_slice() else {
                        bail!("--digest needs exactly one file, got {}", paths.len());
                    };
                    let algorithm = canonical.load()?.algorithm();
                    let digest = Digest::new(algorithm, hex.as_str())
                        .with_context(|| format!("digest is not a {algorithm} digest"))?;
                    vec![updater.append_entry(&absolute(file)?, Some(digest))?]
                }
                None => {
                    let mut records = Vec::new();
                    for path in &paths {
                        let path = absolute(path)?;
                        if path.is_dir() {
                            records.extend(updater.append_directory(&path)?);
                        } else {
                            records.push(updater.append_entry(&path, None)?);
                        }
                    }
                    records
                }
            };
            let lines: Vec<String> = records.iter().map(ToString::to_string).collect();
            emit(json, &lines, || {
                for line in &lines {
                    println!("{line}");
                }
            })?;
            Ok(true)
        }
        Some(("sort", args)) => {
            let canonical = canonical(args, &config)?;
            let records = sort(&canonical)?;
            emit(json, &serde_json::json!({ "records": records }), || {
                println!("{records} records in {}", canonical.path().display());
            })?;
            Ok(true)
        }
        Some(("merge-logs", args)) => {
            let destination = ProvenanceLog::new(required::<PathBuf>(args, "log")?);
            let inputs: Vec<PathBuf> = args.get_many::<PathBuf>("inputs").into_iter().flatten().cloned().collect();
            let policy = match args.get_one::<PathBuf>("fallback-dir") {
                Some(dir) => {
                    let configured = config.clone().with_fallback_log_dir(dir);
                    configured.recovery_policy()?
                }
                None => config.recovery_policy()?,
            };
            let report = consolidate_logs(&inputs, &destination, &policy)?;
            destination.record_all(&report.events())?;
            emit(json, &report, || {
                for line in report.summary() {
                    println!("{line}");
                }
                println!("{} lines merged into {}", report.lines_written(), report.destination.display());
            })?;
            Ok(true)
        }
        Some(("verify", args)) => {
            let canonical = canonical(args, &config)?;
            let report = verify(&canonical, &StreamingHasher::new())?;
            emit(json, &report, || {
                for path in &report.missing {
                    println!("MISSING   {path}");
                }
                for path in &report.mismatched {
                    println!("MISMATCH  {path}");
                }
                println!(
                    "{} ok, {} missing, {} mismatched",
                    report.ok.len(),
                    report.missing.len(),
                    report.mismatched.len()
                );
            })?;
            Ok(report.is_clean())
        }
        Some(("assemble", args)) => {
            let mut inputs = PipelineInputs::new(
                required::<PathBuf>(args, "output")?,
                required::<String>(args, "uuid")?.as_str(),
                object_entry(args)?,
            )
            .with_transfer_logs(args.get_many::<PathBuf>("transfer-log").into_iter().flatten().cloned().collect())
            .with_root_copy(args.get_flag("root-copy"));
            if let Some(agent) = args.get_one::<String>("agent") {
                inputs = inputs.with_agent(agent.as_str());
            }
            if let Some(replacement) = args.get_one::<PathBuf>("replacement") {
                inputs = inputs.with_replacement_manifest(replacement);
            }

            let report = SipAssembler::for_inputs(&inputs, config)?.run(&inputs)?;
            emit(json, &report, || {
                println!("package:   {}", report.package_root.display());
                println!("manifest:  {} ({} records)", report.canonical_manifest.display(), report.final_records);
                println!("log:       {}", report.provenance_log.display());
                for line in report.transfer_logs.summary() {
                    println!("{line}");
                }
                println!("took {}s", (report.finished_at - report.started_at).num_seconds());
            })?;
            Ok(true)
        }
        _ => bail!("unknown command"),
    }
}

fn required<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Result<&'a T> {
    args.get_one::<T>(id).with_context(|| format!("--{id} is required"))
}

fn object_entry(args: &ArgMatches) -> Result<ObjectEntry> {
    let text = required::<String>(args, "object-entry")?;
    text.parse().with_context(|| format!("invalid object entry {text:?}"))
}

fn subtrees(args: &ArgMatches) -> Result<Vec<Subtree>> {
    let Some(values) = args.get_many::<String>("subtree") else {
        return Ok(vec![Subtree::Objects, Subtree::Metadata]);
    };
    values
        .map(|value| match value.parse::<Subtree>() {
            Ok(Subtree::Logs) => bail!("logs holds archived manifests and cannot be consolidated"),
            Ok(subtree) => Ok(subtree),
            Err(err) => bail!(err),
        })
        .collect()
}

fn canonical(args: &ArgMatches, config: &SipConfig) -> Result<CanonicalManifest> {
    let path = absolute(required::<PathBuf>(args, "manifest")?)?;
    Ok(CanonicalManifest::new(path, config.default_algorithm))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir().context("reading current directory")?.join(path))
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["sip", "sort", "--manifest", "m.md5", "--json"])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "sort");
        assert_eq!(args.get_one::<PathBuf>("manifest").unwrap(), &PathBuf::from("m.md5"));
    }

    #[test]
    fn subtrees_default_to_objects_then_metadata() {
        let matches = cli()
            .try_get_matches_from(["sip", "consolidate", "--package", "/sips/abcd"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(subtrees(args).unwrap(), vec![Subtree::Objects, Subtree::Metadata]);
        assert!(object_entry(args).unwrap() == ObjectEntry::NotApplicable);
    }

    #[test]
    fn logs_subtree_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["sip", "consolidate", "--package", "/p/u", "--subtree", "logs"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(subtrees(args).is_err());
    }

    #[test]
    fn verify_exit_code_reflects_mismatch() {
        let fixture = sip_test_utils::PackageFixture::new("u");
        fixture.write_file(Subtree::Objects, "f.mov", b"changed");
        let manifest = fixture.ctx().canonical_manifest_path();
        std::fs::write(
            &manifest,
            sip_test_utils::manifest_line(sip_test_utils::EMPTY_MD5, "u/objects/f.mov"),
        )
        .unwrap();

        let args = vec![
            OsString::from("sip"),
            OsString::from("verify"),
            OsString::from("--manifest"),
            manifest.into_os_string(),
        ];
        let matches = cli().try_get_matches_from(args).unwrap();

        assert!(!run(&matches).unwrap());
    }

    #[test]
    fn merge_logs_twice_appends_once() {
        let fixture = sip_test_utils::PackageFixture::new("u");
        let transfer = fixture.write_outside("reel1_2019_05_06T11_00_00.log", b"copied\n");
        let log = fixture.ctx().provenance_log_path();
        let args = vec![
            OsString::from("sip"),
            OsString::from("merge-logs"),
            OsString::from("--log"),
            log.clone().into_os_string(),
            transfer.into_os_string(),
        ];

        for _ in 0..2 {
            let matches = cli().try_get_matches_from(args.clone()).unwrap();
            assert!(run(&matches).unwrap());
        }

        let lines = fixture.provenance_lines();
        assert_eq!(lines.iter().filter(|l| *l == "copied").count(), 1);
    }
}
