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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("timetable-router-smoke");
    let bundle_out = workspace.join("smoke-backup.ttbackup.zip");
    let snapshot_out = workspace.join("smoke-snapshot.json");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request(&mut stdin, &mut reader, "3", "setup.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "export", "patch": { "prettyJson": false } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "grades.select",
        json!({ "grade": "Grade 7" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "timeSlots.add",
        json!({ "label": "08:00 - 08:40" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "timeSlots.rename",
        json!({ "timeSlotId": 1, "label": "08:00 - 08:45" }),
    );
    let _ = request(&mut stdin, &mut reader, "8", "timeSlots.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "breaks.add",
        json!({ "name": "Lunch", "type": "meal" }),
    );
    let _ = request(&mut stdin, &mut reader, "10", "breaks.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "teachers.upsert",
        json!({ "name": "Mr. X", "subjects": ["Math"] }),
    );
    let _ = request(&mut stdin, &mut reader, "12", "teachers.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "cells.set",
        json!({ "timeSlotId": 1, "dayIndex": 0, "subject": "Math", "teacher": "Mr. X" }),
    );
    let _ = request(&mut stdin, &mut reader, "14", "cells.get", json!({}));
    let _ = request(&mut stdin, &mut reader, "15", "schedule.get", json!({}));
    let _ = request(&mut stdin, &mut reader, "16", "grades.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "grades.copy",
        json!({ "from": "Grade 7", "to": "Grade 8" }),
    );
    let _ = request(&mut stdin, &mut reader, "18", "conflicts.list", json!({}));
    let _ = request(&mut stdin, &mut reader, "19", "stats.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "snapshot.export",
        json!({ "outPath": snapshot_out.to_string_lossy() }),
    );
    let _ = request(&mut stdin, &mut reader, "21", "snapshot.history", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "snapshot.import",
        json!({ "inPath": snapshot_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "cells.clear",
        json!({ "timeSlotId": 1, "dayIndex": 0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "grades.clear",
        json!({ "grade": "Grade 8" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "teachers.remove",
        json!({ "name": "Mr. X" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "26",
        "breaks.remove",
        json!({ "name": "lunch" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "27",
        "timeSlots.remove",
        json!({ "timeSlotId": 1 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "28",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "29",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );

    let unknown = {
        let payload = json!({ "id": "30", "method": "nope.nothing", "params": {} });
        writeln!(stdin, "{}", payload).expect("write request");
        stdin.flush().expect("flush request");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read response line");
        serde_json::from_str::<serde_json::Value>(line.trim()).expect("parse response json")
    };
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unparseable_line_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{ this is not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_json")
    );

    let health = request(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
}
