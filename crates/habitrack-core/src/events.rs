use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::HabitKey;
use crate::ledger::{CompletionKind, EventId};
use crate::plateau::GoalGrowthProposal;
use crate::timer::TimerKey;

/// Every state change the engine makes produces an Event.
/// Subscribers receive them through the [`EventBus`](crate::bus::EventBus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        timer: TimerKey,
        capsule_index: usize,
        target_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        timer: TimerKey,
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        timer: TimerKey,
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero on its own (possibly while the process was away).
    GoalReached {
        timer: TimerKey,
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerFinished {
        timer: TimerKey,
        elapsed_seconds: u64,
        complete_on_finish: bool,
        at: DateTime<Utc>,
    },
    /// Session backgrounded without finishing. `credited` is false when it
    /// was too short to earn partial credit.
    TimerCollapsed {
        timer: TimerKey,
        elapsed_seconds: u64,
        credited: bool,
        at: DateTime<Utc>,
    },
    TimerReset {
        timer: TimerKey,
        at: DateTime<Utc>,
    },
    /// A persisted snapshot no longer matched today's capsule. `fresh_target`
    /// is 0 when the capsule no longer exists.
    SnapshotDiscarded {
        timer: TimerKey,
        stored_target: u64,
        fresh_target: u64,
        at: DateTime<Utc>,
    },
    /// The foreground timer changed.
    ActiveTimerChanged {
        previous: Option<TimerKey>,
        current: Option<TimerKey>,
        at: DateTime<Utc>,
    },
    CompletionLogged {
        habit_key: HabitKey,
        event_id: EventId,
        capsule_index: usize,
        value: f64,
        kind: CompletionKind,
        at: DateTime<Utc>,
    },
    CompletionRemoved {
        habit_key: HabitKey,
        event_id: EventId,
        value: f64,
        at: DateTime<Utc>,
    },
    /// A weekly session was logged but was shorter than the weekly minimum.
    SessionBelowMinimum {
        habit_key: HabitKey,
        event_id: EventId,
        duration_minutes: f64,
        min_duration_minutes: f64,
        at: DateTime<Utc>,
    },
    /// A prerequisite completed today, so this habit may be started.
    HabitUnlocked {
        habit_key: HabitKey,
        prerequisite: HabitKey,
        at: DateTime<Utc>,
    },
    GoalGrowthProposed {
        proposal: GoalGrowthProposal,
        at: DateTime<Utc>,
    },
    GoalGrowthAccepted {
        habit_key: HabitKey,
        previous_goal: f64,
        new_goal: f64,
        at: DateTime<Utc>,
    },
    DayRolledOver {
        habit_key: HabitKey,
        date: NaiveDate,
        qualified: bool,
        carryover: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short name of the variant, as used in the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "TimerStarted",
            Event::TimerPaused { .. } => "TimerPaused",
            Event::TimerResumed { .. } => "TimerResumed",
            Event::GoalReached { .. } => "GoalReached",
            Event::TimerFinished { .. } => "TimerFinished",
            Event::TimerCollapsed { .. } => "TimerCollapsed",
            Event::TimerReset { .. } => "TimerReset",
            Event::SnapshotDiscarded { .. } => "SnapshotDiscarded",
            Event::ActiveTimerChanged { .. } => "ActiveTimerChanged",
            Event::CompletionLogged { .. } => "CompletionLogged",
            Event::CompletionRemoved { .. } => "CompletionRemoved",
            Event::SessionBelowMinimum { .. } => "SessionBelowMinimum",
            Event::HabitUnlocked { .. } => "HabitUnlocked",
            Event::GoalGrowthProposed { .. } => "GoalGrowthProposed",
            Event::GoalGrowthAccepted { .. } => "GoalGrowthAccepted",
            Event::DayRolledOver { .. } => "DayRolledOver",
        }
    }
}
