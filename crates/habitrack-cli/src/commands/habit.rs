use clap::{Args, Subcommand, ValueEnum};
use habitrack_core::{
    ChunkingMode, GrowthType, HabitConfig, HabitKey, HabitMode, MeasurementType, Unit,
};

use super::{open_engine, print_json, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    /// Timed sessions in minutes
    Timer,
    /// Counted repetitions
    Reps,
    /// Counted doses
    Dose,
    /// Done / not done
    Binary,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Trial,
    Growth,
    Fixed,
}

impl From<ModeArg> for HabitMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Trial => HabitMode::Trial,
            ModeArg::Growth => HabitMode::Growth,
            ModeArg::Fixed => HabitMode::Fixed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ChunkingArg {
    Auto,
    ByDuration,
    ByParts,
}

impl From<ChunkingArg> for ChunkingMode {
    fn from(value: ChunkingArg) -> Self {
        match value {
            ChunkingArg::Auto => ChunkingMode::Auto,
            ChunkingArg::ByDuration => ChunkingMode::ByDuration,
            ChunkingArg::ByParts => ChunkingMode::ByParts,
        }
    }
}

/// Fields shared by `add` and `edit`. Unset fields keep their current value.
#[derive(Args, Default)]
pub struct HabitFields {
    /// Display name
    #[arg(long)]
    pub name: Option<String>,
    /// Daily goal in the habit's unit
    #[arg(long)]
    pub goal: Option<f64>,
    /// Target days per week (1-7)
    #[arg(long)]
    pub frequency: Option<u32>,
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    #[arg(long, value_enum)]
    pub chunking: Option<ChunkingArg>,
    /// Disable automatic splitting into capsules
    #[arg(long)]
    pub no_chunking: bool,
    /// Preferred capsule length in minutes
    #[arg(long)]
    pub chunk_minutes: Option<f64>,
    /// Preferred number of capsules
    #[arg(long)]
    pub chunk_count: Option<u32>,
    /// Consecutive good days before proposing growth
    #[arg(long)]
    pub plateau_days: Option<u32>,
    /// Upper bound for proposed goals
    #[arg(long)]
    pub max_goal: Option<f64>,
    /// Growth step: "10%" for a percentage, "5" for a fixed amount
    #[arg(long)]
    pub growth: Option<String>,
    /// Habit that must be complete today before this one can be timed
    #[arg(long)]
    pub depends_on: Option<String>,
    /// Remove the prerequisite
    #[arg(long, conflicts_with = "depends_on")]
    pub no_dependency: bool,
    /// Carry unfinished goal into the next day
    #[arg(long)]
    pub carryover: Option<bool>,
    /// Count sessions of at least this many minutes per week
    #[arg(long)]
    pub weekly_session_min: Option<f64>,
}

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create or replace a habit
    Add {
        /// Habit key
        key: String,
        #[arg(long, value_enum, default_value = "timer")]
        kind: KindArg,
        #[command(flatten)]
        fields: HabitFields,
    },
    /// List all habits
    List,
    /// Show one habit
    Show {
        key: String,
    },
    /// Change fields of an existing habit
    Edit {
        key: String,
        #[command(flatten)]
        fields: HabitFields,
    },
    /// Delete a habit (its completion log is kept)
    Remove {
        key: String,
    },
    /// Accept the pending goal growth proposal
    AcceptGrowth {
        key: String,
    },
    /// Dismiss the pending goal growth proposal
    DismissGrowth {
        key: String,
    },
}

/// Parse "10%" as percentage growth and "5" as fixed growth.
pub fn parse_growth(raw: &str) -> Result<(GrowthType, f64), String> {
    let raw = raw.trim();
    let (growth_type, number) = match raw.strip_suffix('%') {
        Some(number) => (GrowthType::Percentage, number.trim()),
        None => (GrowthType::Fixed, raw),
    };
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid growth value: {raw}"))?;
    Ok((growth_type, value))
}

fn base_config(key: &str, kind: KindArg, name: &str, goal: f64) -> HabitConfig {
    match kind {
        KindArg::Timer => HabitConfig::timer(key, name, goal),
        KindArg::Reps => HabitConfig::counted(key, name, Unit::Reps, goal),
        KindArg::Dose => HabitConfig::counted(key, name, Unit::Dose, goal),
        KindArg::Binary => HabitConfig::binary(key, name),
    }
}

fn apply_fields(config: &mut HabitConfig, fields: HabitFields) -> Result<(), String> {
    if let Some(name) = fields.name {
        config.name = name;
    }
    if let Some(goal) = fields.goal {
        config.current_daily_goal = goal;
    }
    if let Some(frequency) = fields.frequency {
        config.frequency_per_week = frequency;
    }
    if let Some(mode) = fields.mode {
        config.mode = mode.into();
    }
    if let Some(chunking) = fields.chunking {
        config.chunking_mode = chunking.into();
    }
    if fields.no_chunking {
        config.auto_chunking = false;
    }
    if fields.chunk_minutes.is_some() {
        config.preferred_chunk_duration = fields.chunk_minutes;
    }
    if fields.chunk_count.is_some() {
        config.preferred_chunk_count = fields.chunk_count;
    }
    if let Some(days) = fields.plateau_days {
        config.plateau_days_required = days;
    }
    if fields.max_goal.is_some() {
        config.max_goal_cap = fields.max_goal;
    }
    if let Some(growth) = fields.growth {
        let (growth_type, value) = parse_growth(&growth)?;
        config.growth_type = growth_type;
        config.growth_value = value;
    }
    if let Some(prerequisite) = fields.depends_on {
        config.dependent_on_habit_id = Some(HabitKey::new(prerequisite));
    }
    if fields.no_dependency {
        config.dependent_on_habit_id = None;
    }
    if let Some(carryover) = fields.carryover {
        config.carryover_enabled = carryover;
    }
    if fields.weekly_session_min.is_some() {
        config.weekly_session_min_duration = fields.weekly_session_min;
    }
    Ok(())
}

pub fn run(action: HabitAction) -> CliResult {
    let mut engine = open_engine()?;
    match action {
        HabitAction::Add { key, kind, fields } => {
            let name = fields.name.clone().unwrap_or_else(|| key.clone());
            let goal = fields.goal.unwrap_or(1.0);
            let mut config = base_config(&key, kind, &name, goal);
            apply_fields(&mut config, fields)?;
            if config.measurement_type == MeasurementType::Binary {
                config.current_daily_goal = 1.0;
            }
            let record = engine.upsert_habit(config)?;
            print_json(&record)?;
        }
        HabitAction::List => {
            let habits = engine.habits()?;
            print_json(&habits)?;
        }
        HabitAction::Show { key } => {
            let record = engine.ensure_rolled_over(&key.into())?;
            print_json(&record)?;
        }
        HabitAction::Edit { key, fields } => {
            let mut config = engine.habit(&key.into())?.config;
            apply_fields(&mut config, fields)?;
            let record = engine.upsert_habit(config)?;
            print_json(&record)?;
        }
        HabitAction::Remove { key } => {
            let record = engine.remove_habit(&key.into())?;
            print_json(&record)?;
        }
        HabitAction::AcceptGrowth { key } => {
            let proposal = engine.accept_growth_proposal(&key.into())?;
            print_json(&proposal)?;
        }
        HabitAction::DismissGrowth { key } => {
            let proposal = engine.dismiss_growth_proposal(&key.into())?;
            print_json(&proposal)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_with_percent_sign_is_percentage() {
        assert_eq!(parse_growth("10%").unwrap(), (GrowthType::Percentage, 10.0));
        assert_eq!(parse_growth(" 2.5 % ").unwrap(), (GrowthType::Percentage, 2.5));
    }

    #[test]
    fn plain_growth_is_fixed() {
        assert_eq!(parse_growth("5").unwrap(), (GrowthType::Fixed, 5.0));
        assert!(parse_growth("lots").is_err());
    }

    #[test]
    fn unset_fields_keep_current_values() {
        let mut config = HabitConfig::timer("read", "Read", 30.0);
        apply_fields(
            &mut config,
            HabitFields {
                goal: Some(40.0),
                depends_on: Some("meditate".into()),
                ..HabitFields::default()
            },
        )
        .unwrap();
        assert_eq!(config.current_daily_goal, 40.0);
        assert_eq!(config.name, "Read");
        assert_eq!(config.dependent_on_habit_id, Some(HabitKey::new("meditate")));
        assert_eq!(config.frequency_per_week, 7);
    }
}
