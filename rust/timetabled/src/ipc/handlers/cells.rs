use crate::conflicts::conflicting_cells;
use crate::ipc::error::{ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::CellKey;
use crate::schedule::ScheduleCommand;
use serde_json::json;

fn handle_cells_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade = match helpers::grade_param(&req.params, &state.schedule) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let hot = conflicting_cells(state.derived.conflicts(&state.schedule));
    let schedule = &state.schedule;

    // Dense grid in time-slot order; cells keyed to removed slots are not shown.
    let mut rows = Vec::with_capacity(schedule.time_slots().len());
    for slot in schedule.time_slots() {
        let cells: Vec<serde_json::Value> = (0..schedule.days().len())
            .map(|day| {
                let key = CellKey::new(grade.clone(), slot.id, day);
                let mut cell = helpers::cell_json(schedule, &key);
                cell["conflict"] = json!(hot.contains(&key));
                cell
            })
            .collect();
        rows.push(json!({ "timeSlot": slot, "cells": cells }));
    }

    ok(
        &req.id,
        json!({
            "grade": helpers::grade_json(&grade),
            "days": schedule.days(),
            "rows": rows
        }),
    )
}

fn handle_cells_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match helpers::cell_key(&req.params, &state.schedule) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let subject = match helpers::required_str(&req.params, "subject") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let teacher = helpers::optional_str(&req.params, "teacher");

    let command = ScheduleCommand::EditCell {
        key: key.clone(),
        subject,
        teacher,
    };
    match helpers::apply_command(state, command) {
        Ok(saved) => {
            let hot = conflicting_cells(state.derived.conflicts(&state.schedule));
            let mut cell = helpers::cell_json(&state.schedule, &key);
            cell["conflict"] = json!(hot.contains(&key));
            ok(&req.id, json!({ "cell": cell, "saved": saved }))
        }
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_cells_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match helpers::cell_key(&req.params, &state.schedule) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let existed = state.schedule.assignment(&key).is_some();
    match helpers::apply_command(state, ScheduleCommand::ClearCell { key: key.clone() }) {
        Ok(saved) => ok(
            &req.id,
            json!({ "key": key.encode(), "removed": existed, "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cells.get" => Some(handle_cells_get(state, req)),
        "cells.set" => Some(handle_cells_set(state, req)),
        "cells.clear" => Some(handle_cells_clear(state, req)),
        _ => None,
    }
}
