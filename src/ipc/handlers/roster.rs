use crate::error::AttendError;
use crate::ipc::error::{attend_err, ok, respond};
use crate::ipc::helpers::{get_optional_str, get_required_i64, get_required_str, roster_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, ClassroomId, StudentId};
use serde_json::json;

fn handle_classrooms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, state.orchestrator.list_classrooms())
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let classroom_id = match get_required_i64(req, "classroomId") {
        Ok(v) => ClassroomId(v),
        Err(e) => return e.response(&req.id),
    };
    let date = get_optional_str(req, "date")
        .unwrap_or_else(|| state.clock.today().format("%Y-%m-%d").to_string());
    let o = &mut state.orchestrator;
    match o.load_roster(classroom_id, &date) {
        Ok(source) => {
            let mut result = roster_json(o);
            result["source"] = json!(source);
            ok(&req.id, result)
        }
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, roster_json(&state.orchestrator))
}

fn handle_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match get_required_i64(req, "studentId") {
        Ok(v) => StudentId(v),
        Err(e) => return e.response(&req.id),
    };
    let o = &mut state.orchestrator;
    match o.toggle(student_id) {
        Ok(status) => {
            let mut result = roster_json(o);
            result["status"] = json!(status);
            ok(&req.id, result)
        }
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_mark_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = match get_required_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(status) = AttendanceStatus::parse(&raw) else {
        return attend_err(
            &req.id,
            &AttendError::validation(format!("unknown status {:?}", raw)),
        );
    };
    state.orchestrator.mark_all(status);
    ok(&req.id, roster_json(&state.orchestrator))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classrooms.list" => Some(handle_classrooms_list(state, req)),
        "roster.load" => Some(handle_load(state, req)),
        "roster.get" => Some(handle_get(state, req)),
        "roster.toggle" => Some(handle_toggle(state, req)),
        "roster.markAll" => Some(handle_mark_all(state, req)),
        _ => None,
    }
}
