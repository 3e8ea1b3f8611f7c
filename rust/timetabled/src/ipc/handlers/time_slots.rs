use crate::ipc::error::{ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::schedule::ScheduleCommand;
use serde_json::json;

fn handle_time_slots_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "timeSlots": state.schedule.time_slots() }),
    )
}

fn handle_time_slots_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let label = match helpers::required_str(&req.params, "label") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let color = helpers::optional_str(&req.params, "color");
    let id = state.schedule.next_time_slot_id();
    match helpers::apply_command(state, ScheduleCommand::AddTimeSlot { label, color }) {
        Ok(saved) => ok(
            &req.id,
            json!({
                "timeSlot": id.and_then(|id| state.schedule.time_slot(id)),
                "saved": saved
            }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_time_slots_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match helpers::required_u32(&req.params, "timeSlotId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let label = match helpers::required_str(&req.params, "label") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match helpers::apply_command(state, ScheduleCommand::RenameTimeSlot { id, label }) {
        Ok(saved) => ok(
            &req.id,
            json!({ "timeSlot": state.schedule.time_slot(id), "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_time_slots_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match helpers::required_u32(&req.params, "timeSlotId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let before = state.schedule.assignments().len();
    match helpers::apply_command(state, ScheduleCommand::RemoveTimeSlot { id }) {
        Ok(saved) => {
            let pruned = before - state.schedule.assignments().len();
            tracing::info!(time_slot_id = id, pruned, "time slot removed");
            ok(
                &req.id,
                json!({ "timeSlotId": id, "prunedCells": pruned, "saved": saved }),
            )
        }
        Err(e) => schedule_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "timeSlots.list" => Some(handle_time_slots_list(state, req)),
        "timeSlots.add" => Some(handle_time_slots_add(state, req)),
        "timeSlots.rename" => Some(handle_time_slots_rename(state, req)),
        "timeSlots.remove" => Some(handle_time_slots_remove(state, req)),
        _ => None,
    }
}
