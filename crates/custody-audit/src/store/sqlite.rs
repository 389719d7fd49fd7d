//! SQLite-backed audit store.
//!
//! Each event is one row: filterable columns plus the full event JSON. Rows
//! are only ever inserted; nothing in this module updates or deletes.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use crate::error::{AuditError, Result};
use crate::event::AuditEvent;

use super::{AuditStore, TrailFilter};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audit_events (
    event_id   TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    ts_micros  INTEGER NOT NULL,
    user_id    TEXT,
    case_id    TEXT,
    severity   TEXT NOT NULL,
    body       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_events_case ON audit_events(case_id, ts_micros);
CREATE INDEX IF NOT EXISTS idx_audit_events_user ON audit_events(user_id, ts_micros);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory store. Contents vanish with the connection.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Audit writes must be durable before append returns.
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl AuditStore for SqliteStore {
    fn append(&self, event: &AuditEvent) -> Result<()> {
        let body = serde_json::to_string(event)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_events
             (event_id, event_type, ts_micros, user_id, case_id, severity, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.event_type.as_str(),
                event.timestamp.timestamp_micros(),
                event.user_id,
                event.case_id,
                event.severity.as_str(),
                body,
            ],
        )?;
        Ok(())
    }

    fn query(&self, filter: &TrailFilter) -> Result<Vec<AuditEvent>> {
        let mut sql = String::from("SELECT body FROM audit_events WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(case_id) = &filter.case_id {
            sql.push_str(" AND case_id = ?");
            args.push(Box::new(case_id.clone()));
        }
        if let Some(user_id) = &filter.user_id {
            sql.push_str(" AND user_id = ?");
            args.push(Box::new(user_id.clone()));
        }
        if let Some(start) = filter.start {
            sql.push_str(" AND ts_micros >= ?");
            args.push(Box::new(start.timestamp_micros()));
        }
        if let Some(end) = filter.end {
            sql.push_str(" AND ts_micros <= ?");
            args.push(Box::new(end.timestamp_micros()));
        }
        sql.push_str(" ORDER BY ts_micros ASC");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get::<_, String>(0),
        )?;

        let mut out = Vec::new();
        for body in rows {
            let event: AuditEvent = serde_json::from_str(&body?)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;
            // Type filter covers enum variants; applied here rather than in
            // SQL to keep the statement simple.
            if let Some(types) = &filter.event_types {
                if !types.contains(&event.event_type) {
                    continue;
                }
            }
            out.push(event);
        }
        Ok(out)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
