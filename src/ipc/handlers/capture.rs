use crate::ipc::error::{attend_err, ok};
use crate::ipc::helpers::{capture_json, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_camera_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.orchestrator.start_camera() {
        Ok(()) => ok(&req.id, capture_json(&state.orchestrator)),
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_camera_stop(state: &mut AppState, req: &Request) -> serde_json::Value {
    let released = state.orchestrator.stop_camera();
    let mut result = capture_json(&state.orchestrator);
    result["released"] = json!(released);
    ok(&req.id, result)
}

fn handle_camera_capture(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.orchestrator.capture_photo() {
        Ok(_) => ok(&req.id, capture_json(&state.orchestrator)),
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match get_required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e.response(&req.id),
    };
    match state.orchestrator.upload_file(&path) {
        Ok(_) => ok(&req.id, capture_json(&state.orchestrator)),
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_retake(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.orchestrator.retake();
    ok(&req.id, capture_json(&state.orchestrator))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, capture_json(&state.orchestrator))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "camera.start" => Some(handle_camera_start(state, req)),
        "camera.stop" => Some(handle_camera_stop(state, req)),
        "camera.capture" => Some(handle_camera_capture(state, req)),
        "capture.upload" => Some(handle_upload(state, req)),
        "capture.retake" => Some(handle_retake(state, req)),
        "capture.get" => Some(handle_get(state, req)),
        _ => None,
    }
}
