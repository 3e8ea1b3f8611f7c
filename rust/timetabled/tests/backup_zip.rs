#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("timetable-backup-src");
    let workspace2 = temp_dir("timetable-backup-dst");
    let out_dir = temp_dir("timetable-backup-out");

    let db_src = workspace.join("timetable.sqlite3");
    let bytes = b"sqlite-test-payload";
    std::fs::write(&db_src, bytes).expect("write source db");
    let snapshot = r#"{"timetable":{"Grade 7-1-0":{"subject":"Math","teacher":"Mr. X"}}}"#;

    let bundle_path = out_dir.join("workspace.ttbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path, Some(snapshot))
        .expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 3);
    assert_eq!(export.db_sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    assert!(manifest.contains(&export.db_sha256));
    archive
        .by_name("db/timetable.sqlite3")
        .expect("database entry in bundle");

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(import.snapshot_json.as_deref(), Some(snapshot));

    let db_dst = workspace2.join("timetable.sqlite3");
    let restored = std::fs::read(&db_dst).expect("read restored db");
    assert_eq!(restored, bytes);
    assert!(!workspace2.join("timetable.sqlite3.importing").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn bundle_without_snapshot_has_two_entries() {
    let workspace = temp_dir("timetable-backup-nosnap");
    let out_dir = temp_dir("timetable-backup-nosnap-out");
    std::fs::write(workspace.join("timetable.sqlite3"), b"db").expect("write source db");

    let bundle_path = out_dir.join("plain.zip");
    let export =
        backup::export_workspace_bundle(&workspace, &bundle_path, None).expect("export bundle");
    assert_eq!(export.entry_count, 2);

    let import = backup::import_workspace_bundle(&bundle_path, &workspace).expect("import bundle");
    assert!(import.snapshot_json.is_none());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn export_requires_workspace_database() {
    let workspace = temp_dir("timetable-backup-empty");
    let out = workspace.join("never.zip");

    let e = backup::export_workspace_bundle(&workspace, &out, None)
        .expect_err("missing db should fail");
    assert!(e.to_string().contains("workspace database not found"));
    assert!(!out.exists());

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn checksum_mismatch_is_rejected_and_leaves_workspace_alone() {
    let out_dir = temp_dir("timetable-backup-tampered");
    let workspace = temp_dir("timetable-backup-tampered-dst");
    std::fs::write(workspace.join("timetable.sqlite3"), b"original").expect("write existing db");

    let bundle_path = out_dir.join("tampered.zip");
    {
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("start manifest");
        zip.write_all(
            serde_json::json!({
                "format": backup::BUNDLE_FORMAT_V1,
                "dbSha256": "0000000000000000000000000000000000000000000000000000000000000000"
            })
            .to_string()
            .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file("db/timetable.sqlite3", opts).expect("start db");
        zip.write_all(b"tampered").expect("write db");
        zip.finish().expect("finish bundle");
    }

    let e = backup::import_workspace_bundle(&bundle_path, &workspace)
        .expect_err("tampered bundle should fail");
    assert!(e.to_string().contains("checksum mismatch"));
    let kept = std::fs::read(workspace.join("timetable.sqlite3")).expect("read existing db");
    assert_eq!(kept, b"original");
    assert!(!workspace.join("timetable.sqlite3.importing").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn legacy_sqlite_import_is_supported() {
    let out_dir = temp_dir("timetable-backup-legacy");
    let workspace = temp_dir("timetable-backup-legacy-dst");

    let legacy_file = out_dir.join("legacy.sqlite3");
    let bytes = b"legacy-sqlite-copy";
    std::fs::write(&legacy_file, bytes).expect("write legacy sqlite file");

    let import =
        backup::import_workspace_bundle(&legacy_file, &workspace).expect("import legacy sqlite");
    assert_eq!(import.bundle_format_detected, backup::LEGACY_SQLITE_FORMAT);
    assert!(import.snapshot_json.is_none());

    let restored = std::fs::read(workspace.join("timetable.sqlite3")).expect("read restored sqlite");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
