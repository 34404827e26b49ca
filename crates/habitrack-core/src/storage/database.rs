//! SQLite-based habit storage.
//!
//! Provides persistent storage for:
//! - Habit definitions and their day-boundary state
//! - The append-only completion log
//! - Key-value store for timer snapshots

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::{data_dir, migrations, CompletionLog, HabitStore, SnapshotStore};
use crate::error::{DatabaseError, Result};
use crate::habit::{HabitKey, HabitRecord};
use crate::ledger::{CompletionEvent, CompletionKind, EventId, Mood};
use crate::timer::{TimerKey, TimerSnapshot};

/// SQLite database implementing every storage port.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/habitrack/habitrack.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("habitrack.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn corrupt(table: &str, message: impl ToString) -> DatabaseError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        message: message.to_string(),
    }
}

/// Lowercase serde name of a unit enum, for TEXT columns.
fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn enum_from_text<T: DeserializeOwned>(table: &str, text: String) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(text))
        .map_err(|e| corrupt(table, e).into())
}

/// Raw completions row, decoded after the statement is done.
struct CompletionRow {
    id: String,
    habit_key: String,
    capsule_index: i64,
    value: f64,
    duration_seconds: Option<i64>,
    date: String,
    timestamp: String,
    kind: String,
    mood: Option<String>,
}

const COMPLETION_COLUMNS: &str =
    "id, habit_key, capsule_index, value, duration_seconds, date, timestamp, kind, mood";

impl CompletionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            habit_key: row.get(1)?,
            capsule_index: row.get(2)?,
            value: row.get(3)?,
            duration_seconds: row.get(4)?,
            date: row.get(5)?,
            timestamp: row.get(6)?,
            kind: row.get(7)?,
            mood: row.get(8)?,
        })
    }

    fn decode(self) -> Result<CompletionEvent> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| corrupt("completions", e))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt("completions", e))?
            .with_timezone(&Utc);
        let kind: CompletionKind = enum_from_text("completions", self.kind)?;
        let mood: Option<Mood> = self
            .mood
            .map(|m| enum_from_text("completions", m))
            .transpose()?;
        Ok(CompletionEvent {
            id: EventId::from(self.id),
            habit_key: HabitKey::from(self.habit_key),
            capsule_index: usize::try_from(self.capsule_index)
                .map_err(|e| corrupt("completions", e))?,
            value: self.value,
            duration_seconds: self
                .duration_seconds
                .map(u64::try_from)
                .transpose()
                .map_err(|e| corrupt("completions", e))?,
            mood,
            kind,
            date,
            timestamp,
        })
    }
}

impl HabitStore for Database {
    fn get_habit(&self, key: &HabitKey) -> Result<Option<HabitRecord>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM habits WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(
                serde_json::from_str(&j).map_err(|e| corrupt("habits", e))?,
            )),
            None => Ok(None),
        }
    }

    fn list_habits(&self) -> Result<Vec<HabitRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM habits ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for row in rows {
            let record = serde_json::from_str(&row?).map_err(|e| corrupt("habits", e))?;
            records.push(record);
        }
        Ok(records)
    }

    fn put_habit(&mut self, record: &HabitRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO habits (key, record, updated_at) VALUES (?1, ?2, ?3)",
            params![record.key().as_str(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_habit(&mut self, key: &HabitKey) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM habits WHERE key = ?1", params![key.as_str()])?;
        Ok(n > 0)
    }
}

impl CompletionLog for Database {
    fn append(&mut self, event: &CompletionEvent) -> Result<EventId> {
        let mood = event.mood.as_ref().map(enum_text).transpose()?;
        self.conn.execute(
            "INSERT INTO completions
                (id, habit_key, capsule_index, value, duration_seconds, date, timestamp, kind, mood)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id.as_str(),
                event.habit_key.as_str(),
                event.capsule_index as i64,
                event.value,
                event.duration_seconds.map(|s| s as i64),
                event.date.format("%Y-%m-%d").to_string(),
                event.timestamp.to_rfc3339(),
                enum_text(&event.kind)?,
                mood,
            ],
        )?;
        Ok(event.id.clone())
    }

    fn get_event(&self, id: &EventId) -> Result<Option<CompletionEvent>> {
        let sql = format!("SELECT {COMPLETION_COLUMNS} FROM completions WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.as_str()], CompletionRow::from_row)
            .optional()?;
        row.map(CompletionRow::decode).transpose()
    }

    fn delete(&mut self, id: &EventId) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM completions WHERE id = ?1", params![id.as_str()])?;
        Ok(n > 0)
    }

    fn events_between(
        &self,
        habit: &HabitKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionEvent>> {
        let sql = format!(
            "SELECT {COMPLETION_COLUMNS} FROM completions
             WHERE habit_key = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY timestamp"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                habit.as_str(),
                from.format("%Y-%m-%d").to_string(),
                to.format("%Y-%m-%d").to_string()
            ],
            CompletionRow::from_row,
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.decode()?);
        }
        Ok(events)
    }
}

impl SnapshotStore for Database {
    fn load_snapshot(&self, key: &TimerKey) -> Result<Option<TimerSnapshot>> {
        match self.kv_get(&key.storage_key())? {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).map_err(|e| corrupt("kv", e))?,
            )),
            None => Ok(None),
        }
    }

    fn save_snapshot(&mut self, key: &TimerKey, snapshot: &TimerSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.kv_set(&key.storage_key(), &json)?;
        Ok(())
    }

    fn delete_snapshot(&mut self, key: &TimerKey) -> Result<()> {
        self.kv_delete(&key.storage_key())?;
        Ok(())
    }
}
