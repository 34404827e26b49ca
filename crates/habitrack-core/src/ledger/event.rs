//! Append-only completion events.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::habit::HabitKey;

/// Identifier of a logged completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    /// Capsule finished (or manual / binary log).
    Full,
    /// Session stopped early or shorter than the weekly minimum.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Great,
    Good,
    Okay,
    Low,
    Drained,
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "great" => Ok(Mood::Great),
            "good" => Ok(Mood::Good),
            "okay" | "ok" => Ok(Mood::Okay),
            "low" => Ok(Mood::Low),
            "drained" => Ok(Mood::Drained),
            other => Err(format!("unknown mood: {other}")),
        }
    }
}

/// One logged unit of progress. Never mutated; removal is a delete by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub id: EventId,
    pub habit_key: HabitKey,
    pub capsule_index: usize,
    /// Minutes for timer habits, count for unit / binary habits.
    pub value: f64,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub mood: Option<Mood>,
    pub kind: CompletionKind,
    /// Calendar day the event counts toward.
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn full(
        habit_key: HabitKey,
        capsule_index: usize,
        value: f64,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            habit_key,
            capsule_index,
            value,
            duration_seconds: None,
            mood: None,
            kind: CompletionKind::Full,
            date,
            timestamp,
        }
    }

    pub fn partial(
        habit_key: HabitKey,
        capsule_index: usize,
        value: f64,
        duration_seconds: u64,
        date: NaiveDate,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            duration_seconds: Some(duration_seconds),
            kind: CompletionKind::Partial,
            ..Self::full(habit_key, capsule_index, value, date, timestamp)
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = mood;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.kind == CompletionKind::Full
    }
}

/// Round to two decimals (timer credit precision).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn partial_carries_duration() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let event = CompletionEvent::partial("read".into(), 0, 1.5, 90, date, Utc::now());
        assert!(!event.is_complete());
        assert_eq!(event.duration_seconds, Some(90));
    }

    #[test]
    fn mood_parses_case_insensitively() {
        assert_eq!("Great".parse::<Mood>(), Ok(Mood::Great));
        assert_eq!("ok".parse::<Mood>(), Ok(Mood::Okay));
        assert!("meh".parse::<Mood>().is_err());
    }

    #[test]
    fn round2_matches_credit_precision() {
        assert_eq!(round2(4.0), 4.0);
        assert_eq!(round2(250.0 / 60.0), 4.17);
    }
}
