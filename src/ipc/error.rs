use crate::error::AttendError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Error response for a failed workflow operation. Remediation text, when
/// the error has one, goes under `details.remediation`.
pub fn attend_err(id: &str, e: &AttendError) -> serde_json::Value {
    let details = e.remediation().map(|r| json!({ "remediation": r }));
    err(id, e.code(), e.to_string(), details)
}

pub fn respond<T: serde::Serialize>(id: &str, result: crate::error::Result<T>) -> serde_json::Value {
    match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(v) => ok(id, v),
            Err(e) => err(id, "internal", e.to_string(), None),
        },
        Err(e) => attend_err(id, &e),
    }
}
