//! Plateau tracking and goal growth.
//!
//! A plateau is a run of qualifying days at the current goal. Once the run
//! reaches `plateau_days_required` the tracker proposes a larger goal. The
//! proposal only takes effect when accepted.
//!
//! What a missed day does to the run depends on the habit mode and is
//! configurable through [`MissedDayPolicy`]:
//!
//! | Mode   | Default on a missed day |
//! |--------|-------------------------|
//! | Growth | `Reset`                 |
//! | Trial  | `Hold`                  |
//! | Fixed  | never tracked           |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::habit::{GrowthType, HabitConfig, HabitKey, HabitMode, HabitRecord};

/// What happens to the plateau counter on a day that does not qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedDayPolicy {
    /// Start the plateau over.
    Reset,
    /// Keep the counter as is.
    Hold,
    /// Lose one qualifying day.
    Decrement,
}

/// Plateau tuning, loaded from the `[plateau]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    #[serde(default = "default_growth_missed_day")]
    pub growth_missed_day: MissedDayPolicy,
    #[serde(default = "default_trial_missed_day")]
    pub trial_missed_day: MissedDayPolicy,
}

fn default_growth_missed_day() -> MissedDayPolicy {
    MissedDayPolicy::Reset
}

fn default_trial_missed_day() -> MissedDayPolicy {
    MissedDayPolicy::Hold
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            growth_missed_day: default_growth_missed_day(),
            trial_missed_day: default_trial_missed_day(),
        }
    }
}

/// Progress toward the next goal increase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauState {
    pub completions_in_plateau: u32,
    pub plateau_days_required: u32,
    #[serde(default)]
    pub last_plateau_start_date: Option<NaiveDate>,
}

impl PlateauState {
    pub fn new(plateau_days_required: u32) -> Self {
        Self {
            completions_in_plateau: 0,
            plateau_days_required,
            last_plateau_start_date: None,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.completions_in_plateau >= self.plateau_days_required
    }
}

impl Default for PlateauState {
    fn default() -> Self {
        Self::new(7)
    }
}

/// A suggested new daily goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalGrowthProposal {
    pub habit_key: HabitKey,
    pub current_goal: f64,
    pub new_goal: f64,
    /// True when `max_goal_cap` limited the increase.
    pub capped: bool,
    pub proposed_on: NaiveDate,
}

/// Result of processing one day boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateauOutcome {
    pub qualified: bool,
    pub completions_before: u32,
    pub completions_after: u32,
    pub proposal: Option<GoalGrowthProposal>,
}

/// Decides when and how much a goal should grow.
#[derive(Debug, Clone, Default)]
pub struct PlateauTracker {
    config: PlateauConfig,
}

impl PlateauTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PlateauConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlateauConfig {
        &self.config
    }

    fn missed_day_policy(&self, mode: HabitMode) -> Option<MissedDayPolicy> {
        match mode {
            HabitMode::Growth => Some(self.config.growth_missed_day),
            HabitMode::Trial => Some(self.config.trial_missed_day),
            HabitMode::Fixed => None,
        }
    }

    /// Process the end of `date` for one habit.
    ///
    /// Updates `record.plateau` and, when the plateau is satisfied, stores the
    /// proposal in `record.pending_proposal`.
    pub fn end_of_day(
        &self,
        record: &mut HabitRecord,
        date: NaiveDate,
        qualified: bool,
    ) -> PlateauOutcome {
        let before = record.plateau.completions_in_plateau;
        record.plateau.plateau_days_required = record.config.plateau_days_required;

        let Some(missed_policy) = self.missed_day_policy(record.config.mode) else {
            return PlateauOutcome {
                qualified,
                completions_before: before,
                completions_after: before,
                proposal: None,
            };
        };

        let state = &mut record.plateau;
        if qualified {
            if state.completions_in_plateau == 0 {
                state.last_plateau_start_date = Some(date);
            }
            state.completions_in_plateau += 1;
        } else {
            match missed_policy {
                MissedDayPolicy::Reset => {
                    state.completions_in_plateau = 0;
                    state.last_plateau_start_date = None;
                }
                MissedDayPolicy::Hold => {}
                MissedDayPolicy::Decrement => {
                    state.completions_in_plateau = state.completions_in_plateau.saturating_sub(1);
                }
            }
        }
        let after = state.completions_in_plateau;

        let proposal = if record.plateau.is_satisfied() {
            propose(&record.config, date)
        } else {
            None
        };
        if let Some(ref p) = proposal {
            info!(
                habit = %p.habit_key,
                current = p.current_goal,
                new = p.new_goal,
                capped = p.capped,
                "PlateauTracker: goal growth proposed"
            );
            record.pending_proposal = Some(p.clone());
        }

        debug!(
            habit = %record.config.key,
            %date,
            qualified,
            before,
            after,
            "PlateauTracker::end_of_day"
        );
        PlateauOutcome {
            qualified,
            completions_before: before,
            completions_after: after,
            proposal,
        }
    }

    /// Apply a proposal: raise the goal and start a new plateau.
    pub fn accept(&self, record: &mut HabitRecord, date: NaiveDate) -> Option<GoalGrowthProposal> {
        let proposal = record.pending_proposal.take()?;
        record.set_goal(proposal.new_goal, date);
        record.plateau.completions_in_plateau = 0;
        record.plateau.last_plateau_start_date = Some(date);
        info!(habit = %proposal.habit_key, goal = proposal.new_goal, "PlateauTracker::accept");
        Some(proposal)
    }

    /// Decline a proposal: keep the goal and start a new plateau.
    pub fn dismiss(&self, record: &mut HabitRecord) -> Option<GoalGrowthProposal> {
        let proposal = record.pending_proposal.take()?;
        record.plateau.completions_in_plateau = 0;
        record.plateau.last_plateau_start_date = None;
        Some(proposal)
    }
}

/// Compute the next goal for `habit`, or `None` if it cannot grow.
///
/// Fixed habits never grow. A percentage step too small to register at the
/// unit's precision is bumped by one unit step. The result is clamped to
/// `max_goal_cap`.
pub fn propose(habit: &HabitConfig, date: NaiveDate) -> Option<GoalGrowthProposal> {
    if habit.is_fixed() || habit.growth_value <= 0.0 {
        return None;
    }
    let current = habit.current_daily_goal;
    let raw = match habit.growth_type {
        GrowthType::Fixed => current + habit.growth_value,
        GrowthType::Percentage => current * (1.0 + habit.growth_value / 100.0),
    };
    let mut new_goal = habit.unit.round(raw);
    if new_goal <= current {
        new_goal = habit.unit.round(current + habit.unit.step());
    }

    let mut capped = false;
    if let Some(cap) = habit.max_goal_cap {
        if new_goal > cap {
            new_goal = cap;
            capped = true;
        }
    }
    if new_goal <= current {
        return None;
    }

    Some(GoalGrowthProposal {
        habit_key: habit.key.clone(),
        current_goal: current,
        new_goal,
        capped,
        proposed_on: date,
    })
}
