//! Carryover of an unmet daily goal into the next day.
//!
//! At the day boundary the shortfall against yesterday's adjusted goal is
//! rolled into today's first capsule. The carried value never exceeds one
//! day's base goal, so repeated missed days do not snowball.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::event::CompletionEvent;
use super::progress::daily_progress;
use crate::habit::HabitRecord;

/// Shortfall owed on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Carryover {
    pub date: NaiveDate,
    pub value: f64,
}

/// Compute the carryover owed on the day after `date`.
///
/// Returns `None` when carryover is disabled, the habit is a weekly-session
/// habit, or the goal was met.
pub fn carryover_after(
    record: &HabitRecord,
    events: &[CompletionEvent],
    date: NaiveDate,
) -> Option<Carryover> {
    let habit = &record.config;
    if !habit.carryover_enabled || habit.is_weekly_session() {
        return None;
    }
    let shortfall = record.adjusted_goal_on(date) - daily_progress(events, date);
    let value = habit.unit.round(shortfall.min(record.goal_on(date)));
    if value <= 0.0 {
        return None;
    }
    Some(Carryover {
        date: date + Duration::days(1),
        value,
    })
}
