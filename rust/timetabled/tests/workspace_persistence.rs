use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn close(mut child: Child, stdin: ChildStdin) {
    drop(stdin);
    let _ = child.wait();
}

#[test]
fn autosaved_schedule_survives_restart() {
    let workspace = temp_dir("timetable-autosave");

    let (child, mut stdin, mut reader) = spawn_sidecar();
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(opened["restored"].as_bool(), Some(false));
    assert!(workspace.join("timetable.sqlite3").is_file());

    request_ok(&mut stdin, &mut reader, "2", "timeSlots.add", json!({ "label": "08:00 - 08:40" }));
    request_ok(&mut stdin, &mut reader, "3", "grades.select", json!({ "grade": "Form 2" }));
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "cells.set",
        json!({ "timeSlotId": 1, "dayIndex": 1, "subject": "English", "teacher": "Mrs. W" }),
    );
    assert_eq!(set["cell"]["grade"].as_str(), Some("Grade 8"));
    assert_eq!(set["saved"].as_bool(), Some(true));
    close(child, stdin);

    let (child, mut stdin, mut reader) = spawn_sidecar();
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(reopened["restored"].as_bool(), Some(true));
    assert!(reopened["lastSaved"].is_string());

    let schedule = request_ok(&mut stdin, &mut reader, "6", "schedule.get", json!({}));
    assert_eq!(schedule["cellCount"].as_u64(), Some(1));
    assert_eq!(schedule["selectedGrade"]["grade"].as_str(), Some("Grade 8"));
    assert_eq!(schedule["selectedGrade"]["displayName"].as_str(), Some("Form 2"));
    assert_eq!(schedule["timeSlots"][0]["label"].as_str(), Some("08:00 - 08:40"));
    close(child, stdin);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn setup_grid_days_per_week_drives_the_grid() {
    let workspace = temp_dir("timetable-setup");

    let (child, mut stdin, mut reader) = spawn_sidecar();
    let no_ws = request(&mut stdin, &mut reader, "1", "setup.get", json!({}));
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    assert_eq!(setup["grid"]["daysPerWeek"].as_u64(), Some(5));
    assert_eq!(setup["grid"]["autosave"].as_bool(), Some(true));
    assert_eq!(setup["export"]["prettyJson"].as_bool(), Some(true));

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "grid", "patch": { "daysPerWeek": 9 } }),
    );
    assert_eq!(error_code(&out_of_range), Some("bad_params"));
    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "grid", "patch": { "colour": "red" } }),
    );
    assert_eq!(error_code(&unknown_field), Some("bad_params"));

    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "grid", "patch": { "daysPerWeek": 6 } }),
    );
    let schedule = request_ok(&mut stdin, &mut reader, "7", "schedule.get", json!({}));
    assert_eq!(schedule["daysPerWeek"].as_u64(), Some(6));
    assert_eq!(schedule["days"].as_array().map(|d| d.len()), Some(6));
    assert_eq!(schedule["days"][5].as_str(), Some("Saturday"));
    close(child, stdin);

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let schedule = request_ok(&mut stdin, &mut reader, "9", "schedule.get", json!({}));
    assert_eq!(schedule["daysPerWeek"].as_u64(), Some(6));
    close(child, stdin);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn disabling_autosave_stops_workspace_writes() {
    let workspace = temp_dir("timetable-autosave-off");

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(&mut stdin, &mut reader, "2", "timeSlots.add", json!({ "label": "09:00 - 09:40" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "grid", "patch": { "autosave": false } }),
    );
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "cells.set",
        json!({ "grade": "Grade 11", "timeSlotId": 1, "dayIndex": 0, "subject": "Chemistry" }),
    );
    assert_eq!(set["saved"].as_bool(), Some(false));
    close(child, stdin);

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let schedule = request_ok(&mut stdin, &mut reader, "6", "schedule.get", json!({}));
    assert_eq!(schedule["cellCount"].as_u64(), Some(0));
    assert_eq!(schedule["timeSlots"].as_array().map(|s| s.len()), Some(1));
    close(child, stdin);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn failed_bundle_import_keeps_workspace_open() {
    let workspace = temp_dir("timetable-bad-bundle");
    let bundle = workspace.join("broken.ttbackup.zip");
    let mut bytes = vec![0x50, 0x4B, 0x03, 0x04];
    bytes.extend_from_slice(b"definitely not a zip archive");
    std::fs::write(&bundle, bytes).expect("write broken bundle");

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(&mut stdin, &mut reader, "2", "timeSlots.add", json!({ "label": "08:00 - 08:40" }));

    let failed = request(
        &mut stdin,
        &mut reader,
        "3",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(error_code(&failed), Some("io_failed"));

    let setup = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(setup["grid"]["autosave"].as_bool(), Some(true));
    let added = request_ok(&mut stdin, &mut reader, "5", "timeSlots.add", json!({ "label": "08:40 - 09:20" }));
    assert_eq!(added["saved"].as_bool(), Some(true));
    let schedule = request_ok(&mut stdin, &mut reader, "6", "schedule.get", json!({}));
    assert_eq!(schedule["timeSlots"].as_array().map(|s| s.len()), Some(2));
    close(child, stdin);

    let _ = std::fs::remove_dir_all(workspace);
}
