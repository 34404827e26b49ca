use std::time::Duration;

use clap::{Args, Subcommand};
use habitrack_core::{Database, HabitEngine, HabitKey, TimerPhase};
use tracing::debug;

use super::{open_engine, print_json, resolve_capsule, CliResult};

#[derive(Args)]
pub struct TimerTarget {
    /// Habit key
    pub habit: String,
    /// Capsule index (defaults to the first incomplete capsule)
    #[arg(long)]
    pub capsule: Option<usize>,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start (or resume) a capsule timer
    Start(TimerTarget),
    /// Pause a running timer
    Pause(TimerTarget),
    /// Resume a paused timer
    Resume(TimerTarget),
    /// Finish the session now
    Finish {
        #[command(flatten)]
        target: TimerTarget,
        /// Credit only the elapsed minutes instead of the full target
        #[arg(long)]
        elapsed_credit: bool,
    },
    /// Abandon the session, keeping partial credit if enough time passed
    Collapse(TimerTarget),
    /// Reset the timer to its full target
    Reset(TimerTarget),
    /// Print timer state as JSON
    Status(TimerTarget),
    /// Start the timer and count down in the foreground until it finishes
    Watch(TimerTarget),
}

fn target(
    engine: &mut HabitEngine<Database>,
    target: &TimerTarget,
) -> Result<(HabitKey, usize), Box<dyn std::error::Error>> {
    let habit = HabitKey::new(target.habit.as_str());
    let index = resolve_capsule(engine, &habit, target.capsule)?;
    Ok((habit, index))
}

pub fn run(action: TimerAction) -> CliResult {
    let mut engine = open_engine()?;
    match action {
        TimerAction::Start(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.start_timer(&habit, index)?)
        }
        TimerAction::Pause(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.pause_timer(&habit, index)?)
        }
        TimerAction::Resume(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.resume_timer(&habit, index)?)
        }
        TimerAction::Finish {
            target: t,
            elapsed_credit,
        } => {
            let (habit, index) = target(&mut engine, &t)?;
            let result = if elapsed_credit {
                engine.finish_timer_with(&habit, index, false)?
            } else {
                engine.finish_timer(&habit, index)?
            };
            print_json(&result)
        }
        TimerAction::Collapse(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.collapse_timer(&habit, index)?)
        }
        TimerAction::Reset(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.reset_timer(&habit, index)?)
        }
        TimerAction::Status(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            print_json(&engine.timer_status(&habit, index)?)
        }
        TimerAction::Watch(t) => {
            let (habit, index) = target(&mut engine, &t)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(watch(&mut engine, habit, index))
        }
    }
}

/// Drive the foreground timer at 1 Hz. Ctrl-C collapses the session.
async fn watch(engine: &mut HabitEngine<Database>, habit: HabitKey, index: usize) -> CliResult {
    let view = engine.start_timer(&habit, index)?;
    eprintln!("{} capsule {}: {}s left", habit, index, view.remaining_seconds);

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(view) = engine.tick()? else {
                    // Something else took the foreground.
                    return print_json(&engine.timer_status(&habit, index)?);
                };
                debug!(remaining = view.remaining_seconds, "tick");
                if view.phase == TimerPhase::Finished {
                    return print_json(&view);
                }
                eprint!("\r{:>5}s left", view.remaining_seconds);
            }
            _ = &mut ctrl_c => {
                eprintln!();
                let result = engine.collapse_timer(&habit, index)?;
                return print_json(&result);
            }
        }
    }
}
