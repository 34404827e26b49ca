use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::machine::SessionTimerState;
use crate::habit::HabitKey;

/// Persisted timer state. Identical to the live state.
pub type TimerSnapshot = SessionTimerState;

/// Durable key of one capsule timer on one day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerKey {
    pub habit_key: HabitKey,
    pub capsule_label: String,
    pub date: NaiveDate,
}

impl TimerKey {
    pub fn new(habit_key: HabitKey, capsule_label: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            habit_key,
            capsule_label: capsule_label.into(),
            date,
        }
    }

    /// Flat string form used by key-value stores.
    pub fn storage_key(&self) -> String {
        format!(
            "timer:{}:{}:{}",
            self.habit_key,
            self.capsule_label,
            self.date.format("%Y-%m-%d")
        )
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.habit_key, self.capsule_label, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_uses_iso_date() {
        let key = TimerKey::new(
            "read".into(),
            "capsule-2",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        );
        assert_eq!(key.storage_key(), "timer:read:capsule-2:2026-03-02");
    }
}
