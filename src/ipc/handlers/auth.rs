use crate::ipc::error::{attend_err, ok};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let email = match get_required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let password = match get_required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.with_session(|o, storage, clock| match o.login(&email, &password, storage, clock) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => attend_err(&req.id, &e),
    })
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.with_session(|o, storage, _| match o.logout(storage) {
        Ok(()) => ok(&req.id, json!({ "signedIn": false })),
        Err(e) => attend_err(&req.id, &e),
    })
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = state.orchestrator.session();
    ok(
        &req.id,
        json!({
            "signedIn": session.is_some(),
            "session": session,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
