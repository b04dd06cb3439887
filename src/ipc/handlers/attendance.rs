use crate::db::{self, JournalEntry};
use crate::ipc::error::{attend_err, err, ok};
use crate::ipc::helpers::{get_bool, get_optional_i64, roster_json};
use crate::ipc::types::{AppState, Request};
use crate::persistence::SaveOutcome;
use serde_json::json;
use tracing::warn;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let confirm_empty = get_bool(req, "confirmEmpty");
    let mut asked = false;
    let result = state.orchestrator.save(&mut |_total: usize| {
        asked = true;
        confirm_empty
    });
    let outcome = match result {
        Ok(v) => v,
        Err(e) => return attend_err(&req.id, &e),
    };

    if let SaveOutcome::Saved {
        marked,
        updated,
        present,
        absent,
    } = outcome
    {
        if let (Some(conn), Some(classroom_id)) = (&state.db, state.orchestrator.classroom_id()) {
            let entry = JournalEntry {
                classroom_id: classroom_id.0,
                date: state.orchestrator.date().to_string(),
                present: present as i64,
                absent: absent as i64,
                marked: marked as i64,
                updated: updated as i64,
                saved_at: state.clock.now().to_rfc3339(),
            };
            if let Err(e) = db::journal_append(conn, &entry) {
                warn!(error = %e, "failed to journal save");
            }
        }
    }

    ok(
        &req.id,
        json!({
            "outcome": outcome,
            "confirmationRequested": asked,
            "roster": roster_json(&state.orchestrator),
        }),
    )
}

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match get_optional_i64(req, "classroomId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let limit = match get_optional_i64(req, "limit") {
        Ok(v) => v.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500) as usize,
        Err(e) => return e.response(&req.id),
    };
    match db::journal_list(conn, classroom_id, limit) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => err(&req.id, "db_error", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.save" => Some(handle_save(state, req)),
        "attendance.history" => Some(handle_history(state, req)),
        _ => None,
    }
}
