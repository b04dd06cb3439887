use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::helpers::{
    get_optional_i64, get_required_i64, get_required_str, quota_json, review_json, roster_json,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentId;
use crate::recognition::ReviewTier;
use crate::review::{KeyOutcome, Resolution};
use crate::roster::ReviewDecision;
use serde_json::json;

fn resolution_json(r: &Resolution) -> serde_json::Value {
    json!({
        "studentId": r.student_id(),
        "studentName": r.item.student_name,
        "approved": matches!(r.decision, ReviewDecision::Approve { .. }),
    })
}

fn with_views(state: &AppState, mut result: serde_json::Value) -> serde_json::Value {
    result["review"] = review_json(&state.orchestrator);
    result["roster"] = roster_json(&state.orchestrator);
    result
}

fn handle_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.orchestrator.run_recognition() {
        Ok(report) => {
            let mut result = with_views(state, json!({ "report": report }));
            result["quota"] = quota_json(&state.orchestrator);
            ok(&req.id, result)
        }
        Err(e) => attend_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut result = review_json(&state.orchestrator);
    result["quota"] = quota_json(&state.orchestrator);
    ok(&req.id, result)
}

fn handle_resolve(state: &mut AppState, req: &Request, approve: bool) -> serde_json::Value {
    let student_id = match get_required_i64(req, "studentId") {
        Ok(v) => StudentId(v),
        Err(e) => return e.response(&req.id),
    };
    let resolution = if approve {
        state.orchestrator.approve(student_id)
    } else {
        state.orchestrator.reject(student_id)
    };
    let resolved = resolution.as_ref().map(resolution_json);
    ok(&req.id, with_views(state, json!({ "resolved": resolved })))
}

fn handle_bulk_approve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let resolved: Vec<_> = state
        .orchestrator
        .bulk_approve_likely()
        .iter()
        .map(resolution_json)
        .collect();
    ok(&req.id, with_views(state, json!({ "resolved": resolved })))
}

fn handle_bulk_reject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let tier = match get_optional_i64(req, "tier") {
        Ok(None) => ReviewTier::Tier2,
        Ok(Some(n)) => match u8::try_from(n).ok().and_then(ReviewTier::from_wire) {
            Some(t) => t,
            None => return err(&req.id, "bad_params", format!("no review tier {}", n), None),
        },
        Err(e) => return e.response(&req.id),
    };
    let resolved: Vec<_> = state
        .orchestrator
        .bulk_reject(tier)
        .iter()
        .map(resolution_json)
        .collect();
    ok(&req.id, with_views(state, json!({ "resolved": resolved })))
}

fn handle_key(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match get_required_str(req, "key") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let outcome = match state.orchestrator.review_key(&key) {
        KeyOutcome::Ignored => json!({ "action": "ignored" }),
        KeyOutcome::Skipped { cursor } => json!({ "action": "skipped", "cursor": cursor }),
        KeyOutcome::Resolved(r) => json!({ "action": "resolved", "resolved": resolution_json(&r) }),
    };
    ok(&req.id, with_views(state, outcome))
}

fn handle_dismiss(state: &mut AppState, req: &Request) -> serde_json::Value {
    let unresolved = state.orchestrator.dismiss_review();
    ok(&req.id, with_views(state, json!({ "unresolved": unresolved })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "recognition.run" => Some(handle_run(state, req)),
        "review.get" => Some(handle_get(state, req)),
        "review.approve" => Some(handle_resolve(state, req, true)),
        "review.reject" => Some(handle_resolve(state, req, false)),
        "review.bulkApprove" => Some(handle_bulk_approve(state, req)),
        "review.bulkReject" => Some(handle_bulk_reject(state, req)),
        "review.key" => Some(handle_key(state, req)),
        "review.dismiss" => Some(handle_dismiss(state, req)),
        _ => None,
    }
}
