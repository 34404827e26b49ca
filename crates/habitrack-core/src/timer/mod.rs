//! Capsule timers: the pure state machine, its tick handle, snapshots and
//! the storage-bound session wrapper.

mod machine;
mod session;
mod snapshot;
mod ticker;

pub use machine::{SessionTimerState, TimerInput, TimerOutcome, TimerPhase, Transition};
pub use session::{Credit, RestoreReport, SessionTimer};
pub use snapshot::{TimerKey, TimerSnapshot};
pub use ticker::{Ticker, TickerId};
