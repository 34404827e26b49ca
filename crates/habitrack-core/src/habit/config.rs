//! Habit definitions.
//!
//! A [`HabitConfig`] is immutable for the duration of a day. It changes only
//! through an explicit user edit or when a goal growth proposal is accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Stable identifier for a habit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitKey(String);

impl HabitKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HabitKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Minutes,
    Reps,
    Dose,
}

impl Unit {
    /// Round a goal to the unit's natural precision.
    ///
    /// Minutes keep one decimal; reps and doses are whole numbers.
    pub fn round(self, value: f64) -> f64 {
        match self {
            Unit::Minutes => (value * 10.0).round() / 10.0,
            Unit::Reps | Unit::Dose => value.round(),
        }
    }

    /// Smallest meaningful increment for this unit.
    pub fn step(self) -> f64 {
        match self {
            Unit::Minutes => 0.1,
            Unit::Reps | Unit::Dose => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    /// Timed sessions, progress measured in minutes.
    Timer,
    /// Counted units (reps, doses).
    Unit,
    /// Done / not done.
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMode {
    #[default]
    Auto,
    ByDuration,
    ByParts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthType {
    Percentage,
    Fixed,
}

/// Growth policy of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitMode {
    /// No growth pressure yet.
    Trial,
    /// Adaptive growth after each plateau.
    #[default]
    Growth,
    /// Goal never changes.
    Fixed,
}

/// Per-habit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitConfig {
    pub key: HabitKey,
    pub name: String,
    pub unit: Unit,
    pub measurement_type: MeasurementType,
    pub current_daily_goal: f64,
    pub frequency_per_week: u32,
    #[serde(default = "default_true")]
    pub auto_chunking: bool,
    #[serde(default)]
    pub chunking_mode: ChunkingMode,
    #[serde(default)]
    pub preferred_chunk_duration: Option<f64>,
    #[serde(default)]
    pub preferred_chunk_count: Option<u32>,
    #[serde(default)]
    pub mode: HabitMode,
    pub plateau_days_required: u32,
    #[serde(default)]
    pub max_goal_cap: Option<f64>,
    pub growth_type: GrowthType,
    pub growth_value: f64,
    #[serde(default)]
    pub dependent_on_habit_id: Option<HabitKey>,
    #[serde(default)]
    pub carryover_enabled: bool,
    /// Set for anchor / weekly-objective habits: one session of at least this
    /// many minutes counts as one weekly unit.
    #[serde(default)]
    pub weekly_session_min_duration: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl HabitConfig {
    /// A daily timer habit with sensible defaults.
    pub fn timer(key: impl Into<HabitKey>, name: &str, daily_minutes: f64) -> Self {
        Self {
            key: key.into(),
            name: name.to_string(),
            unit: Unit::Minutes,
            measurement_type: MeasurementType::Timer,
            current_daily_goal: daily_minutes,
            frequency_per_week: 7,
            auto_chunking: true,
            chunking_mode: ChunkingMode::Auto,
            preferred_chunk_duration: None,
            preferred_chunk_count: None,
            mode: HabitMode::Growth,
            plateau_days_required: 7,
            max_goal_cap: None,
            growth_type: GrowthType::Percentage,
            growth_value: 10.0,
            dependent_on_habit_id: None,
            carryover_enabled: false,
            weekly_session_min_duration: None,
        }
    }

    /// A daily counted habit (reps or doses).
    pub fn counted(key: impl Into<HabitKey>, name: &str, unit: Unit, daily_count: f64) -> Self {
        Self {
            unit,
            measurement_type: MeasurementType::Unit,
            growth_type: GrowthType::Fixed,
            growth_value: 1.0,
            ..Self::timer(key, name, daily_count)
        }
    }

    /// A done / not-done habit.
    pub fn binary(key: impl Into<HabitKey>, name: &str) -> Self {
        Self {
            unit: Unit::Reps,
            measurement_type: MeasurementType::Binary,
            auto_chunking: false,
            mode: HabitMode::Fixed,
            growth_type: GrowthType::Fixed,
            growth_value: 0.0,
            ..Self::timer(key, name, 1.0)
        }
    }

    pub fn is_trial_mode(&self) -> bool {
        self.mode == HabitMode::Trial
    }

    pub fn is_fixed(&self) -> bool {
        self.mode == HabitMode::Fixed
    }

    /// Anchor / weekly-objective habits count sessions per week.
    pub fn is_weekly_session(&self) -> bool {
        self.weekly_session_min_duration.is_some()
    }

    /// Check every invariant the scheduler and tracker rely on.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.key.as_str().trim().is_empty() {
            return Err(ValidationError::invalid("key", "must not be empty"));
        }
        if !(self.current_daily_goal.is_finite() && self.current_daily_goal > 0.0) {
            return Err(ValidationError::not_positive(
                "current_daily_goal",
                self.current_daily_goal,
            ));
        }
        if !(1..=7).contains(&self.frequency_per_week) {
            return Err(ValidationError::invalid(
                "frequency_per_week",
                format!("must be within 1..=7 (got {})", self.frequency_per_week),
            ));
        }
        if self.measurement_type == MeasurementType::Timer && self.unit != Unit::Minutes {
            return Err(ValidationError::invalid(
                "unit",
                "timer habits are measured in minutes",
            ));
        }
        if let Some(duration) = self.preferred_chunk_duration {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(ValidationError::not_positive(
                    "preferred_chunk_duration",
                    duration,
                ));
            }
        }
        if self.preferred_chunk_count == Some(0) {
            return Err(ValidationError::not_positive("preferred_chunk_count", 0.0));
        }
        if self.plateau_days_required == 0 {
            return Err(ValidationError::not_positive("plateau_days_required", 0.0));
        }
        if !(self.growth_value.is_finite() && self.growth_value >= 0.0) {
            return Err(ValidationError::invalid(
                "growth_value",
                format!("must not be negative (got {})", self.growth_value),
            ));
        }
        if let Some(cap) = self.max_goal_cap {
            if cap < self.current_daily_goal {
                return Err(ValidationError::invalid(
                    "max_goal_cap",
                    format!(
                        "cap {cap} is below the current goal {}",
                        self.current_daily_goal
                    ),
                ));
            }
        }
        if let Some(min) = self.weekly_session_min_duration {
            if !(min.is_finite() && min > 0.0) {
                return Err(ValidationError::not_positive(
                    "weekly_session_min_duration",
                    min,
                ));
            }
        }
        if self.dependent_on_habit_id.as_ref() == Some(&self.key) {
            return Err(ValidationError::DependencyCycle(format!(
                "'{}' depends on itself",
                self.key
            )));
        }
        Ok(())
    }
}
