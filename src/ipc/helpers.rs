use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::orchestrator::AttendanceOrchestrator;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, None)
    }
}

fn bad_params(message: String) -> HandlerErr {
    HandlerErr {
        code: "bad_params",
        message,
    }
}

pub fn get_required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing params.{}", key)))
}

pub fn get_optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params(format!("missing or non-integer params.{}", key)))
}

pub fn get_optional_i64(req: &Request, key: &str) -> Result<Option<i64>, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| bad_params(format!("params.{} must be an integer", key))),
    }
}

pub fn get_bool(req: &Request, key: &str) -> bool {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn roster_json(o: &AttendanceOrchestrator) -> serde_json::Value {
    let roster = o.roster();
    json!({
        "classroomId": o.classroom_id(),
        "date": o.date(),
        "entries": roster.entries(),
        "counts": roster.counts(),
    })
}

pub fn review_json(o: &AttendanceOrchestrator) -> serde_json::Value {
    let review = o.review();
    json!({
        "open": review.is_open(),
        "complete": review.is_complete(),
        "cursor": review.cursor(),
        "current": review.current(),
        "queue": review.queue(),
        "keys": {
            "approve": review.keys().approve.to_string(),
            "reject": review.keys().reject.to_string(),
            "skip": review.keys().skip.to_string(),
        },
        "unknownFaces": o.unknown_faces(),
        "summary": o.last_summary(),
    })
}

pub fn capture_json(o: &AttendanceOrchestrator) -> serde_json::Value {
    json!({
        "phase": o.capture_phase(),
        "image": o.captured().map(|img| json!({
            "id": img.id.to_string(),
            "objectUrl": img.object_url,
            "fileName": img.file_name,
            "mime": img.mime,
            "bytes": img.bytes.len(),
            "sha256": img.sha256,
            "source": img.source,
        })),
        "busy": o.busy(),
    })
}

pub fn quota_json(o: &AttendanceOrchestrator) -> serde_json::Value {
    json!({
        "rateLimit": o.rate_limit(),
        "level": o.quota_level(),
    })
}
