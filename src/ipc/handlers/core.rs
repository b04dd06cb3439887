use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::session::SqliteSessionStorage;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backendUrl": state.orchestrator.backend_url(),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "signedIn": state.orchestrator.session().is_some(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, path.clone()) {
        Ok(restored) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "sessionRestored": restored,
            }),
        ),
        Err(e) => err(&req.id, "db_error", format!("{e:?}"), None),
    }
}

/// Opens the workspace database and picks up any session stored in it.
/// A session that cannot be read is logged and skipped; it must not prevent
/// the workspace from opening.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<bool> {
    let conn = db::open_db(&path)?;
    let restored = match state
        .orchestrator
        .restore_session(&SqliteSessionStorage::new(&conn))
    {
        Ok(restored) => restored,
        Err(e) => {
            warn!(error = %e, "stored session unreadable, ignoring");
            false
        }
    };
    info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    Ok(restored)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
