use crate::ipc::error::{ok, schedule_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::grade_from_display;
use crate::schedule::ScheduleCommand;
use serde_json::json;

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grades: Vec<String> = state
        .schedule
        .grades()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::with_capacity(grades.len());
    for grade in &grades {
        let stats = state.derived.stats(&state.schedule, grade);
        let mut row = helpers::grade_json(grade);
        row["filledCells"] = json!(stats.filled_cells);
        row["completionPercentage"] = json!(stats.completion_percentage);
        row["selected"] = json!(grade == state.schedule.selected_grade());
        rows.push(row);
    }
    ok(&req.id, json!({ "grades": rows }))
}

fn handle_grades_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match helpers::required_str(&req.params, "grade") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    // Accept either the stored name or its "Form N" display label.
    let grade = grade_from_display(&raw);
    match helpers::apply_command(state, ScheduleCommand::SelectGrade { grade }) {
        Ok(saved) => ok(
            &req.id,
            json!({
                "selectedGrade": helpers::grade_json(state.schedule.selected_grade()),
                "saved": saved
            }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_grades_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade = match helpers::grade_param(&req.params, &state.schedule) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let before = state.schedule.merged_view(&grade).count();
    match helpers::apply_command(state, ScheduleCommand::ClearGrade { grade: grade.clone() }) {
        Ok(saved) => ok(
            &req.id,
            json!({ "grade": grade, "removed": before, "saved": saved }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

fn handle_grades_copy(state: &mut AppState, req: &Request) -> serde_json::Value {
    let from = match helpers::required_str(&req.params, "from") {
        Ok(v) => grade_from_display(&v),
        Err(e) => return e.response(&req.id),
    };
    let to = match helpers::required_str(&req.params, "to") {
        Ok(v) => grade_from_display(&v),
        Err(e) => return e.response(&req.id),
    };
    match helpers::apply_command(
        state,
        ScheduleCommand::CopyGrade {
            from: from.clone(),
            to: to.clone(),
        },
    ) {
        Ok(saved) => ok(
            &req.id,
            json!({
                "from": from,
                "to": to.clone(),
                "copied": state.schedule.merged_view(&to).count(),
                "saved": saved
            }),
        ),
        Err(e) => schedule_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.select" => Some(handle_grades_select(state, req)),
        "grades.clear" => Some(handle_grades_clear(state, req)),
        "grades.copy" => Some(handle_grades_copy(state, req)),
        _ => None,
    }
}
