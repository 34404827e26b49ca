//! Dependency gate.
//!
//! A habit with `dependent_on_habit_id` stays locked until the prerequisite
//! habit's ledger shows today's goal as complete. The gate is read-only and
//! re-evaluated on every query.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::habit::{HabitConfig, HabitKey};
use crate::ledger::LedgerDay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GateStatus {
    Unlocked,
    Locked { prerequisite: HabitKey },
}

impl GateStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, GateStatus::Locked { .. })
    }
}

pub struct DependencyGate;

impl DependencyGate {
    /// Evaluate the gate for `habit` given the prerequisite's ledger today.
    ///
    /// A prerequisite without a ledger (unknown habit) does not lock.
    pub fn evaluate(habit: &HabitConfig, prerequisite_today: Option<&LedgerDay>) -> GateStatus {
        match (&habit.dependent_on_habit_id, prerequisite_today) {
            (Some(prerequisite), Some(day)) if !day.is_daily_complete => GateStatus::Locked {
                prerequisite: prerequisite.clone(),
            },
            _ => GateStatus::Unlocked,
        }
    }

    pub fn is_locked(habit: &HabitConfig, prerequisite_today: Option<&LedgerDay>) -> bool {
        Self::evaluate(habit, prerequisite_today).is_locked()
    }

    /// Reject a dependency chain that loops back to `habit`.
    ///
    /// `lookup` returns the prerequisite of an existing habit.
    pub fn check_acyclic<F>(habit: &HabitConfig, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&HabitKey) -> Option<HabitKey>,
    {
        let mut seen = HashSet::new();
        seen.insert(habit.key.clone());
        let mut next = habit.dependent_on_habit_id.clone();
        while let Some(key) = next {
            if !seen.insert(key.clone()) {
                return Err(ValidationError::DependencyCycle(format!(
                    "'{}' eventually depends on '{}'",
                    habit.key, key
                )));
            }
            next = lookup(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn ledger(complete: bool) -> LedgerDay {
        LedgerDay {
            habit_key: "a".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            daily_progress: if complete { 10.0 } else { 3.0 },
            daily_goal: 10.0,
            carryover: 0.0,
            weekly_progress: 0,
            weekly_target: 7,
            is_daily_complete: complete,
            is_weekly_complete: false,
        }
    }

    #[test]
    fn independent_habit_is_never_locked() {
        let habit = HabitConfig::timer("b", "B", 10.0);
        assert!(!DependencyGate::is_locked(&habit, Some(&ledger(false))));
    }

    #[test]
    fn locked_until_prerequisite_complete() {
        let mut habit = HabitConfig::timer("b", "B", 10.0);
        habit.dependent_on_habit_id = Some("a".into());
        assert_eq!(
            DependencyGate::evaluate(&habit, Some(&ledger(false))),
            GateStatus::Locked {
                prerequisite: "a".into()
            }
        );
        assert!(!DependencyGate::is_locked(&habit, Some(&ledger(true))));
        assert!(!DependencyGate::is_locked(&habit, None));
    }

    #[test]
    fn detects_cycles() {
        let edges: HashMap<HabitKey, HabitKey> = [("a".into(), "b".into())].into_iter().collect();
        let mut habit = HabitConfig::timer("b", "B", 10.0);
        habit.dependent_on_habit_id = Some("a".into());
        let result = DependencyGate::check_acyclic(&habit, |k| edges.get(k).cloned());
        assert!(matches!(result, Err(ValidationError::DependencyCycle(_))));

        habit.dependent_on_habit_id = Some("c".into());
        assert!(DependencyGate::check_acyclic(&habit, |k| edges.get(k).cloned()).is_ok());
    }
}
