mod carryover;
mod event;
mod progress;

pub use carryover::{carryover_after, Carryover};
pub use event::{round2, CompletionEvent, CompletionKind, EventId, Mood};
pub use progress::{
    daily_progress, session_meets_minimum, week_start, LedgerDay, ProgressLedger,
};
