use std::path::PathBuf;

use crate::orchestrator::AttendanceOrchestrator;
use crate::session::{Clock, MemorySessionStorage, SessionStorage, SqliteSessionStorage};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub orchestrator: AttendanceOrchestrator,
    pub clock: Box<dyn Clock>,
    /// Session slot used until a workspace database is open.
    pub scratch_session: MemorySessionStorage,
}

impl AppState {
    pub fn new(orchestrator: AttendanceOrchestrator, clock: Box<dyn Clock>) -> Self {
        Self {
            workspace: None,
            db: None,
            orchestrator,
            clock,
            scratch_session: MemorySessionStorage::default(),
        }
    }

    /// Runs `f` with the orchestrator and the session store for the open
    /// workspace (or the in-memory slot when none is open).
    pub fn with_session<R>(
        &mut self,
        f: impl FnOnce(&mut AttendanceOrchestrator, &dyn SessionStorage, &dyn Clock) -> R,
    ) -> R {
        match &self.db {
            Some(conn) => {
                let storage = SqliteSessionStorage::new(conn);
                f(&mut self.orchestrator, &storage, self.clock.as_ref())
            }
            None => f(&mut self.orchestrator, &self.scratch_session, self.clock.as_ref()),
        }
    }
}
