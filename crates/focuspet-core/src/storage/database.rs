//! SQLite-backed snapshot and alert storage.
//!
//! Provides persistent storage for:
//! - The application snapshot (one JSON row in a key-value table)
//! - Scheduled alerts, one row per alert, tagged with their task

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{data_dir, AppSnapshot, SnapshotStore};
use crate::error::{DatabaseError, Result};
use crate::notify::{Alert, AlertKind, NotificationScheduler};

const SNAPSHOT_KEY: &str = "snapshot";

/// SQLite database holding the snapshot and the alert plan.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data dir>/focuspet.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("focuspet.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatabaseError::Locked.into())
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                kind    TEXT NOT NULL,
                number  INTEGER NOT NULL,
                fire_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_task_id ON alerts(task_id);
            CREATE INDEX IF NOT EXISTS idx_alerts_fire_at ON alerts(fire_at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// All scheduled alerts, soonest first.
    pub fn alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT task_id, kind, number, fire_at FROM alerts ORDER BY fire_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            let (task_id, kind, number, fire_at) = row?;
            let kind = match kind.as_str() {
                "due" => AlertKind::Due,
                "deadline" => AlertKind::Deadline,
                _ => AlertKind::Completion,
            };
            let at = DateTime::parse_from_rfc3339(&fire_at)
                .map_err(|e| DatabaseError::QueryFailed(format!("bad alert time '{fire_at}': {e}")))?
                .with_timezone(&Utc);
            alerts.push(Alert {
                task_id,
                kind,
                at,
                number,
            });
        }
        Ok(alerts)
    }
}

fn kind_str(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Due => "due",
        AlertKind::Deadline => "deadline",
        AlertKind::Completion => "completion",
    }
}

impl SnapshotStore for Database {
    fn load_snapshot(&self) -> Result<Option<AppSnapshot>> {
        match self.kv_get(SNAPSHOT_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &AppSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.kv_set(SNAPSHOT_KEY, &json)
    }
}

impl NotificationScheduler for Database {
    fn schedule(&self, task_id: &str, alerts: &[Alert]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM alerts WHERE task_id = ?1", params![task_id])?;
        for alert in alerts {
            tx.execute(
                "INSERT INTO alerts (task_id, kind, number, fire_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    alert.task_id,
                    kind_str(alert.kind),
                    alert.number,
                    alert.at.to_rfc3339()
                ],
            )?;
        }
        tx.commit()?;
        debug!(task_id, count = alerts.len(), "alerts scheduled");
        Ok(())
    }

    fn cancel(&self, task_id: &str) -> Result<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM alerts WHERE task_id = ?1", params![task_id])?;
        debug!(task_id, removed, "alerts cancelled");
        Ok(())
    }
}
