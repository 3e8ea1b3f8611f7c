use crate::ipc::error::{ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::BreakKind;
use crate::schedule::ScheduleCommand;
use serde_json::json;

fn handle_breaks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "breaks": state.schedule.breaks() }))
}

fn handle_breaks_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let kind = helpers::optional_str(&req.params, "type")
        .map(BreakKind::from)
        .unwrap_or(BreakKind::Short);
    match helpers::apply_command(state, ScheduleCommand::AddBreak { name, kind }) {
        Ok(saved) => ok(
            &req.id,
            json!({ "breaks": state.schedule.breaks(), "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_breaks_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match helpers::apply_command(state, ScheduleCommand::RemoveBreak { name }) {
        Ok(saved) => ok(
            &req.id,
            json!({ "breaks": state.schedule.breaks(), "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "breaks.list" => Some(handle_breaks_list(state, req)),
        "breaks.add" => Some(handle_breaks_add(state, req)),
        "breaks.remove" => Some(handle_breaks_remove(state, req)),
        _ => None,
    }
}
