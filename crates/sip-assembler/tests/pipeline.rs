//! Full assembly runs over a fixture package.

use std::fs;

use pretty_assertions::assert_eq;
use sip_assembler::{AssemblerError, PipelineInputs, SipAssembler, SipConfig};
use sip_core::{ObjectEntry, Subtree};
use sip_manifest::DigestAlgorithm;
use sip_test_utils::{manifest_line, PackageFixture, ABC_MD5, EMPTY_MD5};

fn inputs(fixture: &PackageFixture) -> PipelineInputs {
    PipelineInputs::new(fixture.output(), "1234", ObjectEntry::Number("oe1234".into())).with_agent("archivist")
}

#[test]
fn full_run_consolidates_seals_and_sorts() {
    let fixture = PackageFixture::new("1234");
    fixture.write_manifest(Subtree::Objects, "reel1.md5", &[(EMPTY_MD5, "file1.mov")]);
    fixture.write_manifest(Subtree::Metadata, "metadata_manifest.md5", &[(ABC_MD5, "file1.mov_mediainfo.xml")]);
    let transfer_log = fixture.write_outside("moveit/reel1_2019_05_06T11_00_00.log", b"copy started\ncopy ok\n");
    let inputs = inputs(&fixture).with_transfer_logs(vec![transfer_log]);

    let report = SipAssembler::for_inputs(&inputs, SipConfig::default())
        .unwrap()
        .run(&inputs)
        .unwrap();

    assert_eq!(report.transfer_logs.lines_written(), 2);
    assert_eq!(report.consolidations.len(), 2);
    assert_eq!(report.sealed_records, 2);
    assert_eq!(report.final_records, 4);
    assert!(report.migration.is_none());

    let paths: Vec<String> = fixture
        .canonical_text()
        .lines()
        .map(|line| line[32 + 2..].to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "1234/logs/metadata_manifest.md5",
            "1234/logs/reel1.md5",
            "1234/metadata/file1.mov_mediainfo.xml",
            "1234/objects/file1.mov",
        ]
    );

    let lines = fixture.provenance_lines();
    assert!(lines.iter().any(|l| l == "copy started"));
    assert!(lines.last().unwrap().ends_with("EVENT = sip assembly finished"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["final_records"], 4);
    assert_eq!(json["transfer_logs"]["outcomes"][0]["outcome"], "merged");
    assert_eq!(json["transfer_logs"]["outcomes"][0]["verdict"], "unknown");

    let lock = fixture.output().join("oe1234").join(".1234_manifest.md5.lock");
    assert!(!lock.exists());
}

#[test]
fn rerun_after_failed_migration_resumes() {
    let fixture = PackageFixture::new("1234");
    fixture.write_manifest(Subtree::Objects, "reel1.md5", &[(EMPTY_MD5, "file1.mov")]);
    let transfer_log = fixture.write_outside(
        "moveit/reel1_2019_05_06T11_00_00.log",
        b"copy started\nx EVENT = File Transfer Judgement - Success\n",
    );
    let bad_replacement = fixture.write_outside(
        "1234_manifest-sha512.txt",
        manifest_line(&"c".repeat(128), "1234/objects/unknown.mov").as_bytes(),
    );
    let first = inputs(&fixture)
        .with_transfer_logs(vec![transfer_log.clone()])
        .with_replacement_manifest(&bad_replacement);

    let err = SipAssembler::for_inputs(&first, SipConfig::default())
        .unwrap()
        .run(&first)
        .unwrap_err();
    assert!(err.is_integrity_failure());
    let sealed = fixture.canonical_text();

    let retry = inputs(&fixture).with_transfer_logs(vec![transfer_log]);
    let report = SipAssembler::for_inputs(&retry, SipConfig::default())
        .unwrap()
        .run(&retry)
        .unwrap();

    assert_eq!(report.transfer_logs.lines_written(), 0);
    assert!(report.consolidations.iter().all(|c| c.is_noop()));
    assert_eq!(report.sealed_records, 0);
    assert_eq!(report.final_records, 2);
    assert_eq!(fixture.canonical_text().lines().count(), sealed.lines().count());
    let lines = fixture.provenance_lines();
    assert_eq!(lines.iter().filter(|l| *l == "copy started").count(), 1);
}

#[test]
fn stages_with_migration_to_sha512() {
    let fixture = PackageFixture::new("1234");
    fixture.write_manifest(Subtree::Objects, "reel1.md5", &[(EMPTY_MD5, "file1.mov")]);
    let assembler = SipAssembler::for_inputs(&inputs(&fixture), SipConfig::default()).unwrap();

    assembler.start(Some("archivist")).unwrap();
    assembler.consolidate_manifests(false).unwrap();
    assembler.seal_logs().unwrap();

    let sha512: String = assembler
        .canonical()
        .load()
        .unwrap()
        .paths()
        .map(|path| manifest_line(&"c".repeat(128), path.as_str()))
        .collect();
    let replacement = fixture.ctx().sha512_manifest_path();
    fs::write(&replacement, sha512).unwrap();

    let summary = assembler.migrate(&replacement).unwrap();
    let records = assembler.finalize().unwrap();

    assert_eq!(summary.from, DigestAlgorithm::Md5);
    assert_eq!(summary.to, DigestAlgorithm::Sha512);
    assert_eq!(summary.records_updated, 2);
    assert_eq!(records, 2);
    let manifest = assembler.canonical().load().unwrap();
    assert_eq!(manifest.algorithm(), DigestAlgorithm::Sha512);
}

#[test]
fn conflicting_metadata_keeps_objects_consolidated() {
    let fixture = PackageFixture::new("1234");
    fixture.write_manifest(Subtree::Objects, "reel1.md5", &[(EMPTY_MD5, "file1.mov")]);
    fixture.write_manifest(
        Subtree::Metadata,
        "broken.md5",
        &[(EMPTY_MD5, "a.xml"), (ABC_MD5, "a.xml")],
    );
    let inputs = inputs(&fixture);
    let assembler = SipAssembler::for_inputs(&inputs, SipConfig::default()).unwrap();

    let err = assembler.run(&inputs).unwrap_err();

    assert!(err.is_integrity_failure());
    assert!(matches!(err, AssemblerError::Manifest(_)));
    assert_eq!(
        fixture.canonical_text(),
        format!("{EMPTY_MD5}  1234/objects/file1.mov\n")
    );
    assert!(fixture.logs_listing().contains(&"reel1.md5".to_string()));
    assert!(fixture.ctx().subtree_dir(Subtree::Metadata).join("broken.md5").exists());
}
