use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::schedule::ScheduleCommand;
use serde_json::json;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let load = state
        .derived
        .stats(&state.schedule, state.schedule.selected_grade())
        .teacher_load
        .clone();
    let teachers: Vec<serde_json::Value> = state
        .schedule
        .teachers()
        .values()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "subjects": t.subjects,
                "color": t.color,
                "lessons": load.get(&t.name).copied().unwrap_or(0)
            })
        })
        .collect();
    ok(&req.id, json!({ "teachers": teachers }))
}

fn handle_teachers_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let subjects = match req.params.get("subjects") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(s) = item.as_str() else {
                    return err(&req.id, "bad_params", "subjects must be strings", None);
                };
                out.push(s.to_string());
            }
            out
        }
        Some(_) => return err(&req.id, "bad_params", "subjects must be an array", None),
    };
    let color = helpers::optional_str(&req.params, "color");

    let key = name.trim().to_string();
    match helpers::apply_command(
        state,
        ScheduleCommand::UpsertTeacher {
            name,
            subjects,
            color,
        },
    ) {
        Ok(saved) => ok(
            &req.id,
            json!({ "teacher": state.schedule.teachers().get(&key), "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_teachers_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match helpers::required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match helpers::apply_command(state, ScheduleCommand::RemoveTeacher { name }) {
        Ok(saved) => ok(&req.id, json!({ "ok": true, "saved": saved })),
        Err(e) => schedule_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.upsert" => Some(handle_teachers_upsert(state, req)),
        "teachers.remove" => Some(handle_teachers_remove(state, req)),
        _ => None,
    }
}
