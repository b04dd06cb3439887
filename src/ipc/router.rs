use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::{debug, warn};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    let resp = route(state, &req);
    if error_code(&resp) == Some("unauthorized") {
        if let Err(e) = state.with_session(|o, storage, _| o.expire_session(storage)) {
            warn!(error = %e, "failed to clear expired session");
        }
    }
    resp
}

fn route(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::roster::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::capture::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::review::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")?.get("code")?.as_str()
}
