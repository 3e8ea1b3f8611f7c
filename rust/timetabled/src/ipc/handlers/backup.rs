use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::schedule::Schedule;
use crate::snapshot;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    if let Some(conn) = state.db.as_ref() {
        // Bundle the current session even when autosave is off.
        if let Err(e) = helpers::save_state(conn, &state.schedule) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let snapshot_json =
        match snapshot::to_json_string(&snapshot::serialize(&state.schedule, Utc::now()), true) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
        };

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out, Some(&snapshot_json)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256
        }),
    )
}

fn reopen_previous(state: &mut AppState) {
    let Some(prev) = state.workspace.clone() else {
        return;
    };
    match db::open_db(&prev) {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            tracing::error!(workspace = %prev.display(), error = %e, "failed to reopen workspace");
            state.workspace = None;
        }
    }
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let workspace_path = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // Drop open handle before replacing file.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            // A failed import never touches the existing database.
            reopen_previous(state);
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    // The database's own autosaved state wins; start clean so nothing from
    // the previous session leaks into the restored workspace.
    state.schedule = Schedule::default();
    let opened = match crate::ipc::open_workspace(state, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            state.workspace = None;
            return err(&req.id, "db_open_failed", format!("{e:?}"), None);
        }
    };

    let restored = opened
        .get("restored")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let mut from_snapshot_entry = false;
    if !restored {
        if let Some(text) = import.snapshot_json.as_deref() {
            match snapshot::parse(text) {
                Ok(patch) => {
                    let next = patch.apply_to(&Schedule::default());
                    helpers::replace_schedule(state, next, "backup.importWorkspaceBundle");
                    from_snapshot_entry = true;
                }
                Err(e) => tracing::warn!(error = %e, "bundle snapshot entry is unreadable"),
            }
        }
    }

    let saved_state = state
        .db
        .as_ref()
        .and_then(|conn| db::state_load(conn).ok().flatten())
        .map(|s| s.saved_at);

    ok(
        &req.id,
        json!({
            "ok": true,
            "workspacePath": workspace_path.to_string_lossy(),
            "bundleFormatDetected": import.bundle_format_detected,
            "restoredFromSnapshotEntry": from_snapshot_entry,
            "cellCount": state.schedule.assignments().len(),
            "lastSaved": saved_state
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        _ => None,
    }
}
