use crate::db;
use crate::ipc::error::{err, ok, snapshot_err};
use crate::ipc::handlers::setup;
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::snapshot;
use anyhow::Context;
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};

const HISTORY_DEFAULT_LIMIT: i64 = 20;
const HISTORY_MAX_LIMIT: i64 = 200;

fn write_file(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, text)
        .with_context(|| format!("failed to write snapshot {}", path.to_string_lossy()))
}

fn handle_snapshot_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade = helpers::optional_str(&req.params, "grade")
        .unwrap_or_else(|| state.schedule.selected_grade().to_string());
    let settings = setup::export_settings(state.db.as_ref());
    let pretty = req
        .params
        .get("pretty")
        .and_then(|v| v.as_bool())
        .unwrap_or(settings.pretty_json);

    let now = Utc::now();
    let doc = snapshot::serialize(&state.schedule, now);
    let text = match snapshot::to_json_string(&doc, pretty) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    let file_name = snapshot::file_name(&grade, now.date_naive());

    let out_path: Option<PathBuf> = match helpers::optional_str(&req.params, "outPath") {
        Some(p) if !p.trim().is_empty() => Some(PathBuf::from(p.trim())),
        _ => state
            .workspace
            .as_ref()
            .map(|w| w.join(&settings.export_dir).join(&file_name)),
    };

    if let Some(path) = out_path.as_ref() {
        if let Err(e) = write_file(path, &text) {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            );
        }
        if let Some(conn) = state.db.as_ref() {
            if let Err(e) = db::exports_record(
                conn,
                &file_name,
                &path.to_string_lossy(),
                &grade,
                &now.to_rfc3339(),
            ) {
                tracing::warn!(error = %e, "failed to record snapshot export");
            }
        }
        tracing::info!(path = %path.display(), "snapshot exported");
    }

    ok(
        &req.id,
        json!({
            "fileName": file_name,
            "path": out_path.map(|p| p.to_string_lossy().to_string()),
            "document": doc
        }),
    )
}

fn handle_snapshot_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let bytes: Vec<u8> = if let Some(path) = helpers::optional_str(&req.params, "inPath") {
        match std::fs::read(&path) {
            Ok(v) => v,
            Err(e) => {
                return err(
                    &req.id,
                    "io_failed",
                    e.to_string(),
                    Some(json!({ "path": path })),
                )
            }
        }
    } else if let Some(doc) = req.params.get("document") {
        doc.to_string().into_bytes()
    } else if let Some(raw) = helpers::optional_str(&req.params, "text") {
        raw.into_bytes()
    } else {
        return err(&req.id, "bad_params", "missing inPath, document or text", None);
    };

    let patch = match snapshot::parse_bytes(&bytes) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "snapshot rejected");
            return snapshot_err(&req.id, e);
        }
    };
    if !patch.skipped_keys.is_empty() {
        tracing::warn!(skipped = patch.skipped_keys.len(), "snapshot had undecodable cell keys");
    }

    // Week width is also a grid setting; reopening reapplies it.
    if let (Some(days), Some(conn)) = (patch.days_per_week, state.db.as_ref()) {
        if let Err(e) = setup::store_days_per_week(conn, days) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    let next = patch.apply_to(&state.schedule);
    let saved = helpers::replace_schedule(state, next, "snapshot.import");
    ok(
        &req.id,
        json!({
            "cellCount": state.schedule.assignments().len(),
            "selectedGrade": helpers::grade_json(state.schedule.selected_grade()),
            "skippedKeys": patch.skipped_keys,
            "lastSaved": patch.last_saved,
            "saved": saved
        }),
    )
}

fn handle_snapshot_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "exports": [] }));
    };
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_i64())
        .unwrap_or(HISTORY_DEFAULT_LIMIT)
        .clamp(1, HISTORY_MAX_LIMIT);
    match db::exports_list(conn, limit) {
        Ok(rows) => ok(&req.id, json!({ "exports": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.export" => Some(handle_snapshot_export(state, req)),
        "snapshot.import" => Some(handle_snapshot_import(state, req)),
        "snapshot.history" => Some(handle_snapshot_history(state, req)),
        _ => None,
    }
}
