//! In-memory implementation of every storage port.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::{CompletionLog, HabitStore, SnapshotStore};
use crate::error::{CoreError, Result};
use crate::habit::{HabitKey, HabitRecord};
use crate::ledger::{CompletionEvent, EventId};
use crate::timer::{TimerKey, TimerSnapshot};

#[derive(Debug, Default)]
pub struct MemoryStore {
    habits: BTreeMap<HabitKey, HabitRecord>,
    events: Vec<CompletionEvent>,
    snapshots: HashMap<TimerKey, TimerSnapshot>,
    fail_snapshot_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every snapshot write fail, to exercise fire-and-forget paths.
    pub fn set_snapshot_writes_fail(&mut self, fail: bool) {
        self.fail_snapshot_writes = fail;
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl HabitStore for MemoryStore {
    fn get_habit(&self, key: &HabitKey) -> Result<Option<HabitRecord>> {
        Ok(self.habits.get(key).cloned())
    }

    fn list_habits(&self) -> Result<Vec<HabitRecord>> {
        Ok(self.habits.values().cloned().collect())
    }

    fn put_habit(&mut self, record: &HabitRecord) -> Result<()> {
        self.habits.insert(record.key().clone(), record.clone());
        Ok(())
    }

    fn remove_habit(&mut self, key: &HabitKey) -> Result<bool> {
        Ok(self.habits.remove(key).is_some())
    }
}

impl CompletionLog for MemoryStore {
    fn append(&mut self, event: &CompletionEvent) -> Result<EventId> {
        self.events.push(event.clone());
        Ok(event.id.clone())
    }

    fn get_event(&self, id: &EventId) -> Result<Option<CompletionEvent>> {
        Ok(self.events.iter().find(|e| &e.id == id).cloned())
    }

    fn delete(&mut self, id: &EventId) -> Result<bool> {
        let before = self.events.len();
        self.events.retain(|e| &e.id != id);
        Ok(self.events.len() != before)
    }

    fn events_between(
        &self,
        habit: &HabitKey,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompletionEvent>> {
        let mut events: Vec<CompletionEvent> = self
            .events
            .iter()
            .filter(|e| &e.habit_key == habit && e.date >= from && e.date <= to)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

impl SnapshotStore for MemoryStore {
    fn load_snapshot(&self, key: &TimerKey) -> Result<Option<TimerSnapshot>> {
        Ok(self.snapshots.get(key).copied())
    }

    fn save_snapshot(&mut self, key: &TimerKey, snapshot: &TimerSnapshot) -> Result<()> {
        if self.fail_snapshot_writes {
            return Err(CoreError::Custom("snapshot store unavailable".into()));
        }
        self.snapshots.insert(key.clone(), *snapshot);
        Ok(())
    }

    fn delete_snapshot(&mut self, key: &TimerKey) -> Result<()> {
        self.snapshots.remove(key);
        Ok(())
    }
}
