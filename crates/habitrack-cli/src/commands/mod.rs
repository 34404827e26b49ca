pub mod capsules;
pub mod config;
pub mod habit;
pub mod ledger;
pub mod log;
pub mod timer;

use habitrack_core::{Config, Database, HabitEngine, HabitKey};
use serde::Serialize;
use tracing::info;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the engine over the on-disk database and config.
///
/// Every published event is logged at info level.
pub fn open_engine() -> Result<HabitEngine<Database>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut engine = HabitEngine::with_system_clock(db, config);
    engine.subscribe(|event| {
        let json = serde_json::to_string(event).unwrap_or_default();
        info!(event_type = event.event_type(), %json, "event");
    });
    Ok(engine)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explicit capsule index, or the first capsule not yet completed today
/// (the last capsule once all are done).
pub fn resolve_capsule(
    engine: &mut HabitEngine<Database>,
    habit: &HabitKey,
    capsule: Option<usize>,
) -> Result<usize, Box<dyn std::error::Error>> {
    if let Some(index) = capsule {
        return Ok(index);
    }
    let capsules = engine.capsules_for_today(habit)?;
    Ok(capsules
        .iter()
        .find(|c| !c.is_completed)
        .map(|c| c.index)
        .unwrap_or(capsules.len().saturating_sub(1)))
}
