//! Persistence ports and their adapters.
//!
//! The engine depends only on the three traits below. [`MemoryStore`] backs
//! tests; [`Database`] is the SQLite implementation used by the CLI.

mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{Config, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use chrono::NaiveDate;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::habit::{HabitKey, HabitRecord};
use crate::ledger::{CompletionEvent, EventId};
use crate::timer::{TimerKey, TimerSnapshot};

/// Habit definitions plus their day-boundary state.
pub trait HabitStore {
    fn get_habit(&self, key: &HabitKey) -> Result<Option<HabitRecord>>;
    /// All habits, ordered by key.
    fn list_habits(&self) -> Result<Vec<HabitRecord>>;
    fn put_habit(&mut self, record: &HabitRecord) -> Result<()>;
    fn remove_habit(&mut self, key: &HabitKey) -> Result<bool>;
}

/// Append-only completion log.
pub trait CompletionLog {
    fn append(&mut self, event: &CompletionEvent) -> Result<EventId>;
    fn get_event(&self, id: &EventId) -> Result<Option<CompletionEvent>>;
    /// Returns false if no event had this id.
    fn delete(&mut self, id: &EventId) -> Result<bool>;
    /// Events of `habit` dated within `from..=to`, oldest first.
    fn events_between(
        &self,
        habit: &HabitKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionEvent>>;
}

/// Durable key-value store for timer snapshots.
pub trait SnapshotStore {
    fn load_snapshot(&self, key: &TimerKey) -> Result<Option<TimerSnapshot>>;
    fn save_snapshot(&mut self, key: &TimerKey, snapshot: &TimerSnapshot) -> Result<()>;
    fn delete_snapshot(&mut self, key: &TimerKey) -> Result<()>;
}

/// Everything the engine needs from storage.
pub trait EnginePorts: HabitStore + CompletionLog + SnapshotStore {}

impl<T: HabitStore + CompletionLog + SnapshotStore> EnginePorts for T {}

/// Returns the data directory.
///
/// `HABITRACK_DATA_DIR` wins if set. Otherwise `~/.config/habitrack`, or
/// `~/.config/habitrack-dev` when `HABITRACK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("HABITRACK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("HABITRACK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("habitrack-dev")
            } else {
                base_dir.join("habitrack")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
