use crate::ipc::error::err;
use crate::ipc::handlers::setup;
use crate::ipc::types::AppState;
use crate::model::{grade_display_name, CellKey, TimeSlotId};
use crate::schedule::{Schedule, ScheduleCommand, ScheduleError};
use crate::{db, derived, snapshot};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    optional_str(params, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn required_u32(params: &Value, key: &str) -> Result<u32, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    raw.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("{} must be a non-negative integer", key),
            details: Some(json!({ key: raw })),
        })
}

pub fn required_usize(params: &Value, key: &str) -> Result<usize, HandlerErr> {
    required_u32(params, key).map(|n| n as usize)
}

/// `grade` falls back to the selected grade.
pub fn grade_param(params: &Value, schedule: &Schedule) -> Result<String, HandlerErr> {
    let grade = optional_str(params, "grade")
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| schedule.selected_grade().to_string());
    if grade.is_empty() {
        return Err(HandlerErr::bad_params(
            "missing grade and no grade is selected",
        ));
    }
    Ok(grade)
}

pub fn cell_key(params: &Value, schedule: &Schedule) -> Result<CellKey, HandlerErr> {
    let grade = grade_param(params, schedule)?;
    let time_slot_id: TimeSlotId = required_u32(params, "timeSlotId")?;
    let day_index = required_usize(params, "dayIndex")?;
    Ok(CellKey::new(grade, time_slot_id, day_index))
}

pub fn cell_json(schedule: &Schedule, key: &CellKey) -> Value {
    let mut v = json!({
        "key": key.encode(),
        "grade": key.grade,
        "timeSlotId": key.time_slot_id,
        "dayIndex": key.day_index,
        "empty": true,
    });
    let Some(a) = schedule.assignment(key) else {
        return v;
    };
    v["empty"] = Value::Bool(false);
    v["subject"] = Value::from(a.subject());
    let teacher = a.teacher().map(|t| schedule.resolve_teacher(t));
    v["teacher"] = Value::from(teacher.map(|t| t.name()).unwrap_or_default());
    v["teacherResolved"] = Value::Bool(teacher.map(|t| t.is_resolved()).unwrap_or(false));
    v["isBreak"] = Value::Bool(a.is_break());
    v["breakType"] = a
        .break_kind()
        .map(|k| Value::from(k.as_str()))
        .unwrap_or(Value::Null);
    v
}

pub fn grade_json(grade: &str) -> Value {
    json!({ "grade": grade, "displayName": grade_display_name(grade) })
}

/// Applies `command` to the session schedule and autosaves. Returns whether
/// the workspace copy was written.
pub fn apply_command(state: &mut AppState, command: ScheduleCommand) -> Result<bool, ScheduleError> {
    let name = command.name();
    let next = match state.schedule.apply(command) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(command = name, code = %e.code, "command rejected");
            return Err(e);
        }
    };
    state.schedule = next;
    tracing::info!(command = name, "schedule updated");
    Ok(autosave(state))
}

pub fn autosave(state: &AppState) -> bool {
    let Some(conn) = state.db.as_ref() else {
        return false;
    };
    if !setup::grid_settings(Some(conn)).autosave {
        return false;
    }
    match save_state(conn, &state.schedule) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "autosave failed");
            false
        }
    }
}

pub fn save_state(conn: &Connection, schedule: &Schedule) -> anyhow::Result<()> {
    let now = Utc::now();
    let doc = snapshot::serialize(schedule, now);
    let text = snapshot::to_json_string(&doc, false)?;
    db::state_save(
        conn,
        &text,
        &now.to_rfc3339(),
        &derived::content_hash(schedule),
    )
}

/// Swaps in a schedule built outside the command layer (snapshot or bundle
/// loads) and autosaves it.
pub fn replace_schedule(state: &mut AppState, next: Schedule, source: &str) -> bool {
    state.schedule = next;
    tracing::info!(source, cells = state.schedule.assignments().len(), "schedule replaced");
    autosave(state)
}
