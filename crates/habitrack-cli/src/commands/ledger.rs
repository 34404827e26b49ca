use chrono::NaiveDate;
use clap::Args;
use habitrack_core::{GateStatus, HabitKey};
use serde::Serialize;

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct LedgerArgs {
    /// Habit key
    pub habit: String,
    /// Day to report (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Args)]
pub struct LockedArgs {
    /// Habit key
    pub habit: String,
}

#[derive(Serialize)]
struct LockedReport {
    habit_key: HabitKey,
    locked: bool,
    #[serde(flatten)]
    gate: GateStatus,
}

pub fn run_ledger(args: LedgerArgs) -> CliResult {
    let mut engine = open_engine()?;
    let habit = HabitKey::new(args.habit);
    let day = match args.date {
        Some(date) => engine.ledger_on(&habit, date)?,
        None => engine.ledger(&habit)?,
    };
    print_json(&day)
}

pub fn run_locked(args: LockedArgs) -> CliResult {
    let mut engine = open_engine()?;
    let habit = HabitKey::new(args.habit);
    let gate = engine.gate_status(&habit)?;
    print_json(&LockedReport {
        habit_key: habit,
        locked: gate.is_locked(),
        gate,
    })
}
