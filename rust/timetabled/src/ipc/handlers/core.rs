use crate::{db, derived};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::schedule::{Schedule, ScheduleCommand};
use crate::snapshot;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "selectedGrade": state.schedule.selected_grade(),
            "cellCount": state.schedule.assignments().len()
        }),
    )
}

/// Opens (or creates) the workspace database and restores the last autosaved
/// schedule. With nothing saved yet, the in-memory session is kept and saved.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<serde_json::Value> {
    let conn = db::open_db(path)?;

    let mut restored_at: Option<String> = None;
    if let Some(saved) = db::state_load(&conn)? {
        match snapshot::parse(&saved.snapshot_json) {
            Ok(patch) => {
                let restored = patch.apply_to(&Schedule::default());
                let hash = derived::content_hash(&restored);
                if saved.content_hash.as_deref().is_some_and(|h| h != hash) {
                    tracing::warn!(saved = ?saved.content_hash, actual = %hash, "saved state hash mismatch");
                }
                state.schedule = restored;
                restored_at = Some(saved.saved_at);
            }
            // Keep the session schedule rather than fail the open.
            Err(e) => tracing::warn!(error = %e, "saved timetable state is unreadable"),
        }
    }

    let grid = setup::grid_settings(Some(&conn));
    if grid.days_per_week != state.schedule.days_per_week() {
        if let Ok(next) = state.schedule.apply(ScheduleCommand::SetDaysPerWeek {
            days: grid.days_per_week,
        }) {
            state.schedule = next;
        }
    }

    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    let saved = if restored_at.is_none() {
        helpers::autosave(state)
    } else {
        false
    };
    tracing::info!(
        workspace = %path.display(),
        restored = restored_at.is_some(),
        "workspace opened"
    );

    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "restored": restored_at.is_some(),
        "lastSaved": restored_at,
        "saved": saved
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(result) => ok(&req.id, result),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_schedule_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = &state.schedule;
    let grades: Vec<serde_json::Value> = s.grades().into_iter().map(helpers::grade_json).collect();
    let teachers: Vec<&crate::model::Teacher> = s.teachers().values().collect();
    ok(
        &req.id,
        json!({
            "selectedGrade": helpers::grade_json(s.selected_grade()),
            "daysPerWeek": s.days_per_week(),
            "days": s.days(),
            "timeSlots": s.time_slots(),
            "breaks": s.breaks(),
            "teachers": teachers,
            "grades": grades,
            "cellCount": s.assignments().len()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "schedule.get" => Some(handle_schedule_get(state, req)),
        _ => None,
    }
}
