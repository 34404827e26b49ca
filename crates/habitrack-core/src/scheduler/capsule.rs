//! Capsule scheduler.
//!
//! Splits one day's goal into sub-sessions ("capsules"). The scheduler is a
//! pure function of the habit definition, the carryover owed today, and the
//! completions already logged today, so calling it on every render yields the
//! same capsules.
//!
//! ## Chunk count
//!
//! ```text
//! chunking off or goal < threshold  -> 1
//! ByDuration                        -> ceil(goal / preferred_chunk_duration)
//! ByParts                           -> preferred_chunk_count
//! Auto                              -> max(1, ceil(goal / threshold)), capped
//! ```
//!
//! Only the automatic split is capped by `max_capsules`; an explicit chunk
//! preference is honored as given.
//!
//! The threshold is 10 minutes / 20 reps, or 5 minutes / 10 reps in
//! neurodivergent mode. Every capsule but the last gets the goal divided by
//! the chunk count rounded to one decimal; the last absorbs the remainder.
//! Carryover is added to the first capsule only.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::habit::{ChunkingMode, HabitConfig, MeasurementType, Unit};
use crate::ledger::{CompletionEvent, CompletionKind, EventId};

/// Scheduler tuning, loaded from the `[scheduler]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Smaller capsules for users who prefer shorter sessions.
    #[serde(default)]
    pub neurodivergent_mode: bool,
    /// Upper bound on capsules per day for automatic chunking.
    #[serde(default = "default_max_capsules")]
    pub max_capsules: u32,
}

fn default_max_capsules() -> u32 {
    12
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            neurodivergent_mode: false,
            max_capsules: default_max_capsules(),
        }
    }
}

/// One sub-session of today's goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub index: usize,
    pub label: String,
    pub target_value: f64,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_event_id: Option<EventId>,
}

impl Capsule {
    /// Storage label for the capsule at `index`.
    pub fn label_for(index: usize) -> String {
        format!("capsule-{}", index + 1)
    }

    /// Timer target in whole seconds (timer habits only).
    pub fn target_seconds(&self) -> u64 {
        (self.target_value * 60.0).round().max(0.0) as u64
    }
}

/// Per-call inputs that vary from day to day.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleContext<'a> {
    /// Shortfall rolled over from yesterday.
    pub carryover: f64,
    /// Completions already logged today for this habit.
    pub completions: &'a [CompletionEvent],
}

/// Pure capsule scheduler.
#[derive(Debug, Clone, Default)]
pub struct CapsuleScheduler {
    config: SchedulerConfig,
}

impl CapsuleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Chunk threshold for `unit` under the current mode.
    pub fn threshold(&self, unit: Unit) -> f64 {
        match (unit, self.config.neurodivergent_mode) {
            (Unit::Minutes, true) => 5.0,
            (Unit::Minutes, false) => 10.0,
            (Unit::Reps | Unit::Dose, true) => 10.0,
            (Unit::Reps | Unit::Dose, false) => 20.0,
        }
    }

    /// Number of capsules the goal is split into. Always at least one.
    pub fn chunk_count(&self, habit: &HabitConfig, goal: f64) -> usize {
        let threshold = self.threshold(habit.unit);
        let chunking_off =
            !habit.auto_chunking || habit.measurement_type == MeasurementType::Binary;

        let auto = (goal / threshold).ceil().min(f64::from(self.config.max_capsules.max(1)));
        let raw = if chunking_off || goal < threshold {
            1.0
        } else {
            match habit.chunking_mode {
                ChunkingMode::ByDuration => match habit.preferred_chunk_duration {
                    Some(size) if size > 0.0 => (goal / size).ceil(),
                    _ => auto,
                },
                ChunkingMode::ByParts => match habit.preferred_chunk_count {
                    Some(count) if count > 0 => f64::from(count),
                    _ => auto,
                },
                ChunkingMode::Auto => auto,
            }
        };

        // Keep each capsule at least one tenth of a unit.
        let tenths = (goal * 10.0).round().max(1.0);
        raw.clamp(1.0, tenths) as usize
    }

    /// Build today's capsules.
    ///
    /// `habit.current_daily_goal` must already be validated as positive.
    pub fn capsules(&self, habit: &HabitConfig, ctx: ScheduleContext<'_>) -> Vec<Capsule> {
        let goal = habit.current_daily_goal;
        let carryover = ctx.carryover.max(0.0);
        let count = self.chunk_count(habit, goal);
        let values = split_goal(goal, count);

        let mut capsules: Vec<Capsule> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| Capsule {
                index,
                label: Capsule::label_for(index),
                target_value: if index == 0 { value + carryover } else { value },
                is_completed: false,
                completed_event_id: None,
            })
            .collect();

        for event in ctx.completions {
            if event.kind != CompletionKind::Full {
                continue;
            }
            if let Some(capsule) = capsules.get_mut(event.capsule_index) {
                if !capsule.is_completed {
                    capsule.is_completed = true;
                    capsule.completed_event_id = Some(event.id.clone());
                }
            }
        }

        debug!(
            habit = %habit.key,
            goal,
            carryover,
            count,
            "CapsuleScheduler::capsules"
        );
        capsules
    }
}

/// Split `goal` into `count` values that sum to `goal`.
///
/// All but the last value are `goal / count` rounded to one decimal. If that
/// rounding would leave nothing for the last value, the per-capsule value is
/// floored instead.
pub fn split_goal(goal: f64, count: usize) -> Vec<f64> {
    let count = count.max(1);
    if count == 1 {
        return vec![goal];
    }
    let total_tenths = (goal * 10.0).round() as i64;
    let n = count as i64;
    let mut chunk_tenths = (total_tenths as f64 / n as f64).round() as i64;
    if chunk_tenths * (n - 1) >= total_tenths {
        chunk_tenths = total_tenths / n;
    }
    let chunk = chunk_tenths as f64 / 10.0;
    let last = goal - chunk * (count - 1) as f64;

    let mut values = vec![chunk; count - 1];
    values.push(last);
    values
}
