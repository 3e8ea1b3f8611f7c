use crate::conflicts::ConflictSort;
use crate::db;
use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::{DEFAULT_DAYS_PER_WEEK, WEEK_DAYS};
use crate::schedule::ScheduleCommand;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grid,
    Export,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grid" => Some(Self::Grid),
            "export" => Some(Self::Export),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grid => "setup.grid",
            Self::Export => "setup.export",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grid => json!({
            "daysPerWeek": DEFAULT_DAYS_PER_WEEK,
            "autosave": true,
            "conflictSort": "day"
        }),
        SetupSection::Export => json!({
            "prettyJson": true,
            "exportDir": "exports"
        }),
    }
}

pub struct GridSettings {
    pub days_per_week: usize,
    pub autosave: bool,
    pub conflict_sort: ConflictSort,
}

pub struct ExportSettings {
    pub pretty_json: bool,
    pub export_dir: String,
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Grid => match k.as_str() {
                "daysPerWeek" => {
                    let n = parse_i64_range(v, k, 1, WEEK_DAYS.len() as i64)?;
                    obj.insert(k.clone(), Value::from(n));
                }
                "autosave" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "conflictSort" => {
                    let s = parse_string_max(v, k, 16)?.to_ascii_lowercase();
                    if ConflictSort::parse(&s).is_none() {
                        return Err("conflictSort must be one of: day, teacher".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown grid field: {}", k)),
            },
            SetupSection::Export => match k.as_str() {
                "prettyJson" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "exportDir" => {
                    let s = parse_string_max(v, k, 200)?;
                    if s.is_empty() {
                        return Err("exportDir must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown export field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block setup.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn section_or_default(conn: Option<&Connection>, section: SetupSection) -> Value {
    let Some(conn) = conn else {
        return default_section(section);
    };
    match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(section = section.key(), error = %e, "falling back to default settings");
            default_section(section)
        }
    }
}

pub fn grid_settings(conn: Option<&Connection>) -> GridSettings {
    let v = section_or_default(conn, SetupSection::Grid);
    GridSettings {
        days_per_week: v
            .get("daysPerWeek")
            .and_then(|n| n.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_DAYS_PER_WEEK),
        autosave: v.get("autosave").and_then(|b| b.as_bool()).unwrap_or(true),
        conflict_sort: v
            .get("conflictSort")
            .and_then(|s| s.as_str())
            .and_then(ConflictSort::parse)
            .unwrap_or(ConflictSort::Day),
    }
}

/// Writes `daysPerWeek` into the stored grid section, keeping its other fields.
pub fn store_days_per_week(conn: &Connection, days: usize) -> anyhow::Result<()> {
    let mut current = load_section(conn, SetupSection::Grid)?;
    let mut patch = Map::new();
    patch.insert("daysPerWeek".to_string(), Value::from(days));
    merge_section_patch(SetupSection::Grid, &mut current, &patch).map_err(anyhow::Error::msg)?;
    db::settings_set_json(conn, SetupSection::Grid.key(), &current)
}

pub fn export_settings(conn: Option<&Connection>) -> ExportSettings {
    let v = section_or_default(conn, SetupSection::Export);
    ExportSettings {
        pretty_json: v.get("prettyJson").and_then(|b| b.as_bool()).unwrap_or(true),
        export_dir: v
            .get("exportDir")
            .and_then(|s| s.as_str())
            .unwrap_or("exports")
            .to_string(),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let grid = match load_section(conn, SetupSection::Grid) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let export = match load_section(conn, SetupSection::Export) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "grid": grid, "export": export }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.key(), "settings updated");

    // The grid width lives on the schedule too; keep them in step.
    let days = current
        .get("daysPerWeek")
        .and_then(|n| n.as_u64())
        .map(|n| n as usize);
    if let (SetupSection::Grid, Some(days)) = (section, days) {
        if days != state.schedule.days_per_week() {
            if let Err(e) = helpers::apply_command(state, ScheduleCommand::SetDaysPerWeek { days }) {
                return schedule_err(&req.id, e);
            }
        }
    }
    ok(&req.id, json!({ "ok": true, "settings": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
