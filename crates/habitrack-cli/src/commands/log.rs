use clap::Args;
use habitrack_core::{EventId, HabitKey, ManualLog, Mood};

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct LogArgs {
    /// Habit key
    pub habit: String,
    /// Count for unit habits, minutes for timer habits
    #[arg(long)]
    pub value: Option<f64>,
    /// Session length in minutes
    #[arg(long)]
    pub minutes: Option<f64>,
    /// Capsule index (defaults to the first incomplete capsule)
    #[arg(long)]
    pub capsule: Option<usize>,
    /// great, good, okay, low or drained
    #[arg(long)]
    pub mood: Option<Mood>,
}

#[derive(Args)]
pub struct UncompleteArgs {
    /// Habit key
    pub habit: String,
    /// Completion event to remove
    #[arg(long)]
    pub event_id: Option<String>,
}

pub fn run_log(args: LogArgs) -> CliResult {
    let mut engine = open_engine()?;
    let log = ManualLog {
        value: args.value,
        duration_minutes: args.minutes,
        capsule_index: args.capsule,
        mood: args.mood,
    };
    let event = engine.log_manual(&HabitKey::new(args.habit), log)?;
    print_json(&event)
}

pub fn run_uncomplete(args: UncompleteArgs) -> CliResult {
    let mut engine = open_engine()?;
    let event_id = args.event_id.map(EventId::from);
    let event = engine.uncomplete(&HabitKey::new(args.habit), event_id.as_ref())?;
    print_json(&event)
}
