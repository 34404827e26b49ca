mod config;

pub use config::{
    ChunkingMode, GrowthType, HabitConfig, HabitKey, HabitMode, MeasurementType, Unit,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::Carryover;
use crate::plateau::{GoalGrowthProposal, PlateauState};

/// Everything persisted per habit: the definition plus the day-boundary state
/// owned by the ledger and the plateau tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitRecord {
    pub config: HabitConfig,
    #[serde(default)]
    pub plateau: PlateauState,
    /// Carryover into `carryover.date`, if any.
    #[serde(default)]
    pub carryover: Option<Carryover>,
    /// Last calendar date whose day boundary has been processed.
    #[serde(default)]
    pub last_rollover: Option<NaiveDate>,
    #[serde(default)]
    pub pending_proposal: Option<GoalGrowthProposal>,
    /// Earlier goals, oldest first, so past days keep the goal they had.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goal_history: Vec<GoalChange>,
}

/// The daily goal changed on `from`; `previous_goal` applied before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalChange {
    pub from: NaiveDate,
    pub previous_goal: f64,
}

impl HabitRecord {
    pub fn new(config: HabitConfig) -> Self {
        let plateau = PlateauState::new(config.plateau_days_required);
        Self {
            config,
            plateau,
            carryover: None,
            last_rollover: None,
            pending_proposal: None,
            goal_history: Vec::new(),
        }
    }

    pub fn key(&self) -> &HabitKey {
        &self.config.key
    }

    /// Carryover value that applies on `date`.
    pub fn carryover_on(&self, date: NaiveDate) -> f64 {
        match &self.carryover {
            Some(c) if c.date == date => c.value,
            _ => 0.0,
        }
    }

    /// The daily goal that applied on `date`.
    pub fn goal_on(&self, date: NaiveDate) -> f64 {
        self.goal_history
            .iter()
            .find(|change| date < change.from)
            .map(|change| change.previous_goal)
            .unwrap_or(self.config.current_daily_goal)
    }

    /// The goal in force on `date` plus the carryover owed on `date`.
    pub fn adjusted_goal_on(&self, date: NaiveDate) -> f64 {
        self.goal_on(date) + self.carryover_on(date)
    }

    /// Replace the daily goal from `from` on, remembering the old one.
    pub fn set_goal(&mut self, goal: f64, from: NaiveDate) {
        let previous_goal = self.config.current_daily_goal;
        if previous_goal == goal {
            return;
        }
        // Several edits on one day: days before it still had the first goal.
        if self.goal_history.last().map(|c| c.from) != Some(from) {
            self.goal_history.push(GoalChange {
                from,
                previous_goal,
            });
        }
        self.config.current_daily_goal = goal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn goal_on_follows_history() {
        let mut record = HabitRecord::new(HabitConfig::timer("read", "Read", 10.0));
        record.set_goal(11.0, day(4));
        record.set_goal(12.0, day(4));
        record.set_goal(15.0, day(9));

        assert_eq!(record.goal_on(day(2)), 10.0);
        assert_eq!(record.goal_on(day(3)), 10.0);
        assert_eq!(record.goal_on(day(4)), 12.0);
        assert_eq!(record.goal_on(day(8)), 12.0);
        assert_eq!(record.goal_on(day(9)), 15.0);
        assert_eq!(record.goal_history.len(), 2);
    }

    #[test]
    fn unchanged_goal_leaves_no_history() {
        let mut record = HabitRecord::new(HabitConfig::timer("read", "Read", 10.0));
        record.set_goal(10.0, day(4));
        assert!(record.goal_history.is_empty());
        assert_eq!(record.goal_on(day(1)), 10.0);
    }
}
