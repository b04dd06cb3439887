//! Signed-in teacher session. Storage and clock are injected so the session
//! can live in the workspace database in production and in memory in tests.

use crate::db;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

const SESSION_KEY: &str = "auth.session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub token: String,
    pub user: UserProfile,
    pub role: String,
    pub signed_in_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn is_teacher(&self) -> bool {
        self.role.eq_ignore_ascii_case("teacher")
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait SessionStorage {
    fn load(&self) -> anyhow::Result<Option<SessionContext>>;
    fn store(&self, session: &SessionContext) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemorySessionStorage {
    slot: RefCell<Option<SessionContext>>,
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> anyhow::Result<Option<SessionContext>> {
        Ok(self.slot.borrow().clone())
    }

    fn store(&self, session: &SessionContext) -> anyhow::Result<()> {
        *self.slot.borrow_mut() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}

/// Session kept in the workspace `settings` table.
pub struct SqliteSessionStorage<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSessionStorage<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SessionStorage for SqliteSessionStorage<'_> {
    fn load(&self) -> anyhow::Result<Option<SessionContext>> {
        match db::settings_get_json(self.conn, SESSION_KEY)? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    fn store(&self, session: &SessionContext) -> anyhow::Result<()> {
        db::settings_set_json(self.conn, SESSION_KEY, &serde_json::to_value(session)?)
    }

    fn clear(&self) -> anyhow::Result<()> {
        db::settings_delete(self.conn, SESSION_KEY)
    }
}

/// Builds a session from a successful login.
pub fn start_session(token: String, user: UserProfile, clock: &dyn Clock) -> SessionContext {
    let role = user.role.clone();
    SessionContext {
        token,
        user,
        role,
        signed_in_at: clock.now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(clock: &dyn Clock) -> SessionContext {
        start_session(
            "tok-123".to_string(),
            UserProfile {
                id: 7,
                name: "Ms Rao".to_string(),
                email: "rao@school.test".to_string(),
                role: "teacher".to_string(),
            },
            clock,
        )
    }

    #[test]
    fn memory_storage_round_trip() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 10, 12, 8, 30, 0).unwrap());
        let storage = MemorySessionStorage::default();
        assert!(storage.load().expect("load").is_none());
        let session = sample(&clock);
        assert!(session.is_teacher());
        storage.store(&session).expect("store");
        assert_eq!(storage.load().expect("load"), Some(session));
        storage.clear().expect("clear");
        assert!(storage.load().expect("load").is_none());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 10, 12).unwrap());
    }

    #[test]
    fn sqlite_storage_round_trip() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        let storage = SqliteSessionStorage::new(&conn);
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        let session = sample(&clock);
        storage.store(&session).expect("store");
        assert_eq!(storage.load().expect("load"), Some(session));
        storage.clear().expect("clear");
        assert!(storage.load().expect("load").is_none());
    }
}
