use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub const DB_FILE: &str = "attendd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS save_journal(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            classroom_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            present INTEGER NOT NULL,
            absent INTEGER NOT NULL,
            marked INTEGER NOT NULL,
            updated INTEGER NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_save_journal_class_date ON save_journal(classroom_id, date)",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub classroom_id: i64,
    pub date: String,
    pub present: i64,
    pub absent: i64,
    pub marked: i64,
    pub updated: i64,
    pub saved_at: String,
}

pub fn journal_append(conn: &Connection, entry: &JournalEntry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO save_journal(classroom_id, date, present, absent, marked, updated, saved_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            entry.classroom_id,
            &entry.date,
            entry.present,
            entry.absent,
            entry.marked,
            entry.updated,
            &entry.saved_at,
        ),
    )?;
    Ok(())
}

/// Most recent saves first; optionally restricted to one classroom.
pub fn journal_list(
    conn: &Connection,
    classroom_id: Option<i64>,
    limit: usize,
) -> anyhow::Result<Vec<JournalEntry>> {
    let mut stmt = conn.prepare(
        "SELECT classroom_id, date, present, absent, marked, updated, saved_at
         FROM save_journal
         WHERE (?1 IS NULL OR classroom_id = ?1)
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map((classroom_id, limit as i64), |r| {
            Ok(JournalEntry {
                classroom_id: r.get(0)?,
                date: r.get(1)?,
                present: r.get(2)?,
                absent: r.get(3)?,
                marked: r.get(4)?,
                updated: r.get(5)?,
                saved_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(classroom_id: i64, date: &str) -> JournalEntry {
        JournalEntry {
            classroom_id,
            date: date.to_string(),
            present: 2,
            absent: 1,
            marked: 3,
            updated: 0,
            saved_at: "2025-10-12T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn settings_upsert_and_delete() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        settings_set_json(&conn, "k", &serde_json::json!({ "a": 1 })).expect("set");
        settings_set_json(&conn, "k", &serde_json::json!({ "a": 2 })).expect("set again");
        assert_eq!(
            settings_get_json(&conn, "k").expect("get"),
            Some(serde_json::json!({ "a": 2 }))
        );
        settings_delete(&conn, "k").expect("delete");
        assert_eq!(settings_get_json(&conn, "k").expect("get"), None);
    }

    #[test]
    fn journal_lists_newest_first_and_filters() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        journal_append(&conn, &entry(1, "2025-10-10")).expect("append");
        journal_append(&conn, &entry(2, "2025-10-11")).expect("append");
        journal_append(&conn, &entry(1, "2025-10-12")).expect("append");

        let all = journal_list(&conn, None, 10).expect("list");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date, "2025-10-12");

        let one = journal_list(&conn, Some(1), 1).expect("list");
        assert_eq!(one, vec![entry(1, "2025-10-12")]);
    }
}
