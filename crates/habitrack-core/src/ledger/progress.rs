//! Daily and weekly progress aggregation.
//!
//! All aggregates are derived from the completion log on demand, so deleting
//! an event reverses its contribution exactly.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::event::{CompletionEvent, CompletionKind, EventId};
use crate::error::{LedgerError, Result};
use crate::habit::{HabitConfig, HabitKey, HabitRecord};
use crate::storage::CompletionLog;

/// Aggregate view of one habit on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDay {
    pub habit_key: HabitKey,
    pub date: NaiveDate,
    pub daily_progress: f64,
    /// Goal including carryover.
    pub daily_goal: f64,
    pub carryover: f64,
    pub weekly_progress: u32,
    pub weekly_target: u32,
    pub is_daily_complete: bool,
    pub is_weekly_complete: bool,
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sum of all logged values (full and partial) on `date`.
pub fn daily_progress(events: &[CompletionEvent], date: NaiveDate) -> f64 {
    events
        .iter()
        .filter(|e| e.date == date)
        .map(|e| e.value)
        .sum()
}

/// Whether a logged session meets the weekly minimum duration.
///
/// Events without a recorded duration fall back to their value, which is in
/// minutes for timer habits.
pub fn session_meets_minimum(habit: &HabitConfig, event: &CompletionEvent) -> bool {
    let Some(min_minutes) = habit.weekly_session_min_duration else {
        return true;
    };
    let minutes = match event.duration_seconds {
        Some(seconds) => seconds as f64 / 60.0,
        None => event.value,
    };
    minutes + 1e-9 >= min_minutes
}

/// Aggregates completion events into [`LedgerDay`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressLedger;

impl ProgressLedger {
    pub fn new() -> Self {
        Self
    }

    /// Append a completion to the log.
    pub fn record<L: CompletionLog + ?Sized>(
        &self,
        log: &mut L,
        event: CompletionEvent,
    ) -> Result<EventId> {
        info!(
            habit = %event.habit_key,
            capsule = event.capsule_index,
            value = event.value,
            kind = ?event.kind,
            "ProgressLedger::record"
        );
        log.append(&event)
    }

    /// Remove a previously logged completion.
    ///
    /// # Errors
    /// `MissingEventId` when no id is given, `EventNotFound` when the id is
    /// unknown or belongs to another habit. Nothing is deleted in either case.
    pub fn uncomplete<L: CompletionLog + ?Sized>(
        &self,
        log: &mut L,
        habit: &HabitKey,
        event_id: Option<&EventId>,
    ) -> Result<CompletionEvent> {
        let id = event_id.ok_or_else(|| LedgerError::MissingEventId {
            habit: habit.to_string(),
        })?;
        let event = match log.get_event(id)? {
            Some(event) if &event.habit_key == habit => event,
            _ => return Err(LedgerError::EventNotFound(id.to_string()).into()),
        };
        if !log.delete(id)? {
            return Err(LedgerError::EventNotFound(id.to_string()).into());
        }
        info!(habit = %habit, event = %id, value = event.value, "ProgressLedger::uncomplete");
        Ok(event)
    }

    /// Compute the ledger for `record` on `date`.
    pub fn day<L: CompletionLog + ?Sized>(
        &self,
        log: &L,
        record: &HabitRecord,
        date: NaiveDate,
    ) -> Result<LedgerDay> {
        let events = log.events_between(record.key(), week_start(date), date)?;
        Ok(self.day_from_events(record, date, &events))
    }

    /// Same as [`ProgressLedger::day`] over an already-fetched slice that
    /// covers at least the ISO week up to `date`.
    pub fn day_from_events(
        &self,
        record: &HabitRecord,
        date: NaiveDate,
        events: &[CompletionEvent],
    ) -> LedgerDay {
        let habit = &record.config;
        let carryover = record.carryover_on(date);
        let daily_goal = record.goal_on(date) + carryover;
        let progress = daily_progress(events, date);
        let is_daily_complete = progress + 1e-9 >= daily_goal;

        let weekly_progress = if habit.is_weekly_session() {
            self.weekly_sessions(habit, events, date)
        } else {
            self.complete_days(record, events, date)
        };
        let weekly_target = habit.frequency_per_week;

        let day = LedgerDay {
            habit_key: habit.key.clone(),
            date,
            daily_progress: progress,
            daily_goal,
            carryover,
            weekly_progress,
            weekly_target,
            is_daily_complete,
            is_weekly_complete: weekly_progress >= weekly_target,
        };
        debug!(?day, "ProgressLedger::day");
        day
    }

    /// Sessions this week that count toward the weekly objective.
    fn weekly_sessions(
        &self,
        habit: &HabitConfig,
        events: &[CompletionEvent],
        date: NaiveDate,
    ) -> u32 {
        let start = week_start(date);
        events
            .iter()
            .filter(|e| e.date >= start && e.date <= date)
            .filter(|e| e.kind == CompletionKind::Full)
            .filter(|e| session_meets_minimum(habit, e))
            .count() as u32
    }

    /// Days this week whose progress met the goal.
    fn complete_days(
        &self,
        record: &HabitRecord,
        events: &[CompletionEvent],
        date: NaiveDate,
    ) -> u32 {
        let mut day = week_start(date);
        let mut count = 0;
        while day <= date {
            if daily_progress(events, day) + 1e-9 >= record.adjusted_goal_on(day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }

    /// Whether `date` counts toward the plateau.
    ///
    /// Daily habits qualify by completing the day; weekly-session habits
    /// qualify by logging at least one session that met the minimum.
    pub fn qualifies(
        &self,
        record: &HabitRecord,
        events: &[CompletionEvent],
        date: NaiveDate,
    ) -> bool {
        let habit = &record.config;
        if habit.is_weekly_session() {
            events
                .iter()
                .filter(|e| e.date == date && e.kind == CompletionKind::Full)
                .any(|e| session_meets_minimum(habit, e))
        } else {
            daily_progress(events, date) + 1e-9 >= record.adjusted_goal_on(date)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::HabitConfig;
    use crate::storage::MemoryStore;
    use chrono::Utc;

    fn date(d: u32) -> NaiveDate {
        // 2026-03-02 is a Monday.
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        assert_eq!(week_start(date(2)), date(2));
        assert_eq!(week_start(date(8)), date(2));
        assert_eq!(week_start(date(9)), date(9));
    }

    #[test]
    fn daily_progress_includes_partials() {
        let record = HabitRecord::new(HabitConfig::timer("read", "Read", 20.0));
        let key = record.key().clone();
        let events = vec![
            CompletionEvent::full(key.clone(), 0, 10.0, date(3), Utc::now()),
            CompletionEvent::partial(key.clone(), 1, 4.5, 270, date(3), Utc::now()),
            CompletionEvent::full(key, 0, 10.0, date(2), Utc::now()),
        ];
        let day = ProgressLedger::new().day_from_events(&record, date(3), &events);
        assert_eq!(day.daily_progress, 14.5);
        assert!(!day.is_daily_complete);
        assert_eq!(day.weekly_progress, 0);
    }

    #[test]
    fn daily_habit_weekly_progress_counts_complete_days() {
        let mut config = HabitConfig::timer("read", "Read", 10.0);
        config.frequency_per_week = 2;
        let record = HabitRecord::new(config);
        let key = record.key().clone();
        let events = vec![
            CompletionEvent::full(key.clone(), 0, 10.0, date(2), Utc::now()),
            CompletionEvent::full(key, 0, 10.0, date(4), Utc::now()),
        ];
        let day = ProgressLedger::new().day_from_events(&record, date(4), &events);
        assert!(day.is_daily_complete);
        assert_eq!(day.weekly_progress, 2);
        assert!(day.is_weekly_complete);
    }

    #[test]
    fn short_weekly_session_does_not_count() {
        let mut config = HabitConfig::timer("gym", "Gym", 10.0);
        config.frequency_per_week = 3;
        config.weekly_session_min_duration = Some(10.0);
        let record = HabitRecord::new(config);
        let key = record.key().clone();
        let events = vec![
            CompletionEvent::partial(key.clone(), 0, 7.0, 7 * 60, date(3), Utc::now()),
            CompletionEvent::full(key, 0, 12.0, date(2), Utc::now()).with_duration(12 * 60),
        ];
        let ledger = ProgressLedger::new();
        let day = ledger.day_from_events(&record, date(3), &events);
        assert_eq!(day.weekly_progress, 1);
        assert_eq!(day.daily_progress, 7.0);
        assert!(!ledger.qualifies(&record, &events, date(3)));
        assert!(ledger.qualifies(&record, &events, date(2)));
    }

    #[test]
    fn carryover_raises_daily_goal() {
        let mut record = HabitRecord::new(HabitConfig::timer("read", "Read", 20.0));
        record.carryover = Some(crate::ledger::Carryover {
            date: date(3),
            value: 5.0,
        });
        let key = record.key().clone();
        let events = vec![CompletionEvent::full(key, 0, 20.0, date(3), Utc::now())];
        let day = ProgressLedger::new().day_from_events(&record, date(3), &events);
        assert_eq!(day.daily_goal, 25.0);
        assert_eq!(day.carryover, 5.0);
        assert!(!day.is_daily_complete);
    }

    #[test]
    fn uncomplete_requires_event_id() {
        let mut store = MemoryStore::new();
        let ledger = ProgressLedger::new();
        let key = HabitKey::from("read");
        let err = ledger.uncomplete(&mut store, &key, None).unwrap_err();
        assert!(err.to_string().contains("no specific log found"));
    }

    #[test]
    fn uncomplete_reverses_progress() {
        let mut store = MemoryStore::new();
        let ledger = ProgressLedger::new();
        let record = HabitRecord::new(HabitConfig::timer("read", "Read", 10.0));
        let key = record.key().clone();

        let id = ledger
            .record(
                &mut store,
                CompletionEvent::full(key.clone(), 0, 10.0, date(3), Utc::now()),
            )
            .unwrap();
        assert!(ledger.day(&store, &record, date(3)).unwrap().is_daily_complete);

        let removed = ledger.uncomplete(&mut store, &key, Some(&id)).unwrap();
        assert_eq!(removed.id, id);
        let day = ledger.day(&store, &record, date(3)).unwrap();
        assert_eq!(day.daily_progress, 0.0);
        assert!(!day.is_daily_complete);
    }

    #[test]
    fn uncomplete_refuses_other_habits_events() {
        let mut store = MemoryStore::new();
        let ledger = ProgressLedger::new();
        let id = ledger
            .record(
                &mut store,
                CompletionEvent::full("gym".into(), 0, 10.0, date(3), Utc::now()),
            )
            .unwrap();
        let result = ledger.uncomplete(&mut store, &HabitKey::from("read"), Some(&id));
        assert!(result.is_err());
        assert!(store.get_event(&id).unwrap().is_some());
    }
}
