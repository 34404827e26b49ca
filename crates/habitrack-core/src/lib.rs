//! # Habitrack Core Library
//!
//! This library provides the core logic for habitrack, an adaptive habit
//! tracker. It follows a CLI-first design: every operation is available through
//! the standalone `habitrack` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Capsule Scheduler**: splits a day's goal into sub-sessions ("capsules")
//! - **Session Timer**: a pure countdown state machine per capsule, persisted
//!   as snapshots so it survives restarts
//! - **Progress Ledger**: derives daily and weekly totals and carryover from an
//!   append-only completion log
//! - **Plateau Tracker**: proposes a larger goal after a run of good days
//! - **Dependency Gate**: locks a habit until its prerequisite is done today
//! - **Storage**: SQLite for habits, completions and snapshots; TOML for config
//!
//! ## Key Components
//!
//! - [`HabitEngine`]: facade over all of the above
//! - [`Database`]: SQLite implementation of the storage ports
//! - [`Config`]: application configuration management
//! - [`EventBus`]: subscription point for every state change

pub mod bus;
pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod habit;
pub mod ledger;
pub mod plateau;
pub mod scheduler;
pub mod storage;
pub mod timer;

pub use bus::{EventBus, SubscriptionId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{HabitEngine, ManualLog, TimerResult, TimerView};
pub use error::{ConfigError, CoreError, DatabaseError, LedgerError, Result, ValidationError};
pub use events::Event;
pub use gate::{DependencyGate, GateStatus};
pub use habit::{
    ChunkingMode, GoalChange, GrowthType, HabitConfig, HabitKey, HabitMode, HabitRecord,
    MeasurementType, Unit,
};
pub use ledger::{CompletionEvent, CompletionKind, EventId, LedgerDay, Mood, ProgressLedger};
pub use plateau::{GoalGrowthProposal, MissedDayPolicy, PlateauConfig, PlateauState, PlateauTracker};
pub use scheduler::{Capsule, CapsuleScheduler, ScheduleContext, SchedulerConfig};
pub use storage::{
    CompletionLog, Config, Database, EnginePorts, HabitStore, MemoryStore, SnapshotStore,
};
pub use timer::{SessionTimer, SessionTimerState, TimerKey, TimerPhase};
