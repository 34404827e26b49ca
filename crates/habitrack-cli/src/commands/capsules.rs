use clap::Args;

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct CapsulesArgs {
    /// Habit key
    pub habit: String,
}

pub fn run(args: CapsulesArgs) -> CliResult {
    let mut engine = open_engine()?;
    let capsules = engine.capsules_for_today(&args.habit.into())?;
    print_json(&capsules)
}
