use crate::conflicts::{sorted_for_display, ConflictSort};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::WEEK_DAYS;
use serde_json::json;

fn handle_conflicts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let order = match req.params.get("sort").and_then(|v| v.as_str()) {
        Some(raw) => match ConflictSort::parse(raw) {
            Some(o) => o,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "sort must be one of: day, teacher",
                    Some(json!({ "sort": raw })),
                )
            }
        },
        None => setup::grid_settings(state.db.as_ref()).conflict_sort,
    };
    let grade_filter = helpers::optional_str(&req.params, "grade");

    let conflicts = state.derived.conflicts(&state.schedule);
    let records: Vec<serde_json::Value> = sorted_for_display(conflicts, order)
        .into_iter()
        .filter(|r| {
            grade_filter
                .as_deref()
                .map(|g| r.grades.contains(g))
                .unwrap_or(true)
        })
        .map(|r| {
            let mut v = json!(r);
            v["day"] = json!(WEEK_DAYS.get(r.day_index).copied().unwrap_or("?"));
            v["timeSlotLabel"] = json!(state
                .schedule
                .time_slot(r.time_slot_id)
                .map(|s| s.label.as_str()));
            v
        })
        .collect();
    ok(
        &req.id,
        json!({ "count": records.len(), "conflicts": records }),
    )
}

fn handle_stats_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade = match helpers::grade_param(&req.params, &state.schedule) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let conflict_count = state.derived.conflicts(&state.schedule).len();
    let stats = state.derived.stats(&state.schedule, &grade).clone();
    let mut result = json!(stats);
    result["displayName"] = json!(crate::model::grade_display_name(&grade));
    result["conflictCount"] = json!(conflict_count);
    result["contentHash"] = json!(state.derived.hash());
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "conflicts.list" => Some(handle_conflicts_list(state, req)),
        "stats.get" => Some(handle_stats_get(state, req)),
        _ => None,
    }
}
