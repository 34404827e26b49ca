//! A capsule timer bound to durable storage.
//!
//! Wraps the pure [`SessionTimerState`] machine with the persistence contract:
//!
//! - every transition into or within `Running`, and every pause, writes a
//!   snapshot keyed by `(habit, capsule label, date)`;
//! - finishing, collapsing and resetting delete the snapshot;
//! - on restart the snapshot is reloaded and the wall-clock gap applied.
//!
//! Snapshot writes are fire-and-forget: failures are logged, never returned.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::machine::{SessionTimerState, TimerInput, TimerOutcome, TimerPhase, Transition};
use super::snapshot::TimerKey;
use super::ticker::{Ticker, TickerId};
use crate::ledger::{round2, CompletionKind};
use crate::scheduler::Capsule;
use crate::storage::SnapshotStore;

/// How a timer was brought back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "restore", rename_all = "snake_case")]
pub enum RestoreReport {
    /// No usable snapshot; a new idle timer was created.
    Fresh,
    /// Snapshot loaded; a running timer had the wall-clock gap applied.
    Resumed { phase: TimerPhase },
    /// Snapshot target no longer matches today's capsule; it was dropped.
    StaleDiscarded {
        stored_target: u64,
        fresh_target: u64,
    },
    /// The ledger already shows the capsule complete.
    AlreadyCompleted,
    /// The countdown ran out while the process was away.
    FinishedWhileAway,
}

/// What a timer outcome is worth in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub value: f64,
    pub duration_seconds: u64,
    pub kind: CompletionKind,
}

#[derive(Debug)]
pub struct SessionTimer {
    key: TimerKey,
    capsule_index: usize,
    /// Capsule target in minutes.
    capsule_target: f64,
    state: SessionTimerState,
    ticker: Ticker,
}

impl SessionTimer {
    pub fn new(key: TimerKey, capsule: &Capsule) -> Self {
        Self {
            key,
            capsule_index: capsule.index,
            capsule_target: capsule.target_value,
            state: SessionTimerState::new(capsule.target_seconds()),
            ticker: Ticker::new(),
        }
    }

    /// Rebuild the timer for `capsule` from storage.
    ///
    /// When the countdown ran out while away, the returned outcome must be
    /// credited exactly as if the tick loop had kept running.
    pub fn restore<S: SnapshotStore + ?Sized>(
        key: TimerKey,
        capsule: &Capsule,
        store: &mut S,
        now_ms: u64,
    ) -> (Self, RestoreReport, Option<TimerOutcome>) {
        let mut timer = Self::new(key, capsule);
        let fresh_target = capsule.target_seconds();

        if capsule.is_completed {
            timer.state = SessionTimerState::completed(fresh_target);
            timer.forget(store);
            return (timer, RestoreReport::AlreadyCompleted, None);
        }

        let snapshot = match store.load_snapshot(&timer.key) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    key = %timer.key,
                    error = %e,
                    "failed to load timer snapshot, starting fresh"
                );
                None
            }
        };
        let Some(snapshot) = snapshot else {
            return (timer, RestoreReport::Fresh, None);
        };

        if snapshot.target_seconds != fresh_target {
            warn!(
                key = %timer.key,
                stored_target = snapshot.target_seconds,
                fresh_target,
                "discarding stale timer snapshot"
            );
            timer.forget(store);
            let report = RestoreReport::StaleDiscarded {
                stored_target: snapshot.target_seconds,
                fresh_target,
            };
            return (timer, report, None);
        }

        match snapshot.phase {
            TimerPhase::Running => {
                timer.state = snapshot;
                timer.ticker.arm();
                let transition = timer.drive(TimerInput::Rehydrate, store, now_ms);
                match transition.outcome {
                    Some(outcome) => (timer, RestoreReport::FinishedWhileAway, Some(outcome)),
                    None => {
                        let report = RestoreReport::Resumed {
                            phase: TimerPhase::Running,
                        };
                        (timer, report, None)
                    }
                }
            }
            TimerPhase::Paused | TimerPhase::Idle => {
                timer.state = snapshot;
                let report = RestoreReport::Resumed {
                    phase: snapshot.phase,
                };
                (timer, report, None)
            }
            // A finished snapshot whose credit never reached the ledger.
            TimerPhase::Finished => {
                timer.forget(store);
                (timer, RestoreReport::Fresh, None)
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn key(&self) -> &TimerKey {
        &self.key
    }

    pub fn capsule_index(&self) -> usize {
        self.capsule_index
    }

    pub fn capsule_target(&self) -> f64 {
        self.capsule_target
    }

    pub fn state(&self) -> &SessionTimerState {
        &self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase
    }

    pub fn ticker_id(&self) -> Option<TickerId> {
        self.ticker.active()
    }

    /// Convert an outcome into ledger credit. `Discarded` earns nothing.
    pub fn credit(&self, outcome: TimerOutcome) -> Option<Credit> {
        match outcome {
            TimerOutcome::GoalReached { elapsed_seconds } => Some(Credit {
                value: self.capsule_target,
                duration_seconds: elapsed_seconds,
                kind: CompletionKind::Full,
            }),
            TimerOutcome::Finished {
                elapsed_seconds,
                complete_on_finish,
            } => Some(Credit {
                value: if complete_on_finish {
                    self.capsule_target
                } else {
                    round2(elapsed_seconds as f64 / 60.0)
                },
                duration_seconds: elapsed_seconds,
                kind: CompletionKind::Full,
            }),
            TimerOutcome::Collapsed { elapsed_seconds } => Some(Credit {
                value: round2(elapsed_seconds as f64 / 60.0),
                duration_seconds: elapsed_seconds,
                kind: CompletionKind::Partial,
            }),
            TimerOutcome::Discarded { .. } => None,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start<S: SnapshotStore + ?Sized>(&mut self, store: &mut S, now_ms: u64) -> Transition {
        self.drive(TimerInput::Start, store, now_ms)
    }

    pub fn pause<S: SnapshotStore + ?Sized>(&mut self, store: &mut S, now_ms: u64) -> Transition {
        self.drive(TimerInput::Pause, store, now_ms)
    }

    pub fn resume<S: SnapshotStore + ?Sized>(&mut self, store: &mut S, now_ms: u64) -> Transition {
        self.drive(TimerInput::Resume, store, now_ms)
    }

    /// One 1 Hz tick. Ignored unless the ticker is armed.
    pub fn tick<S: SnapshotStore + ?Sized>(&mut self, store: &mut S, now_ms: u64) -> Transition {
        if !self.ticker.is_armed() {
            debug!(key = %self.key, "tick ignored: no active interval");
            return self.unchanged();
        }
        self.drive(TimerInput::Tick, store, now_ms)
    }

    /// Visibility regained: apply the wall-clock gap to a running timer.
    pub fn rehydrate<S: SnapshotStore + ?Sized>(
        &mut self,
        store: &mut S,
        now_ms: u64,
    ) -> Transition {
        self.drive(TimerInput::Rehydrate, store, now_ms)
    }

    pub fn finish<S: SnapshotStore + ?Sized>(
        &mut self,
        complete_on_finish: bool,
        store: &mut S,
        now_ms: u64,
    ) -> Transition {
        self.drive(TimerInput::Finish { complete_on_finish }, store, now_ms)
    }

    pub fn collapse<S: SnapshotStore + ?Sized>(
        &mut self,
        min_elapsed_secs: u64,
        store: &mut S,
        now_ms: u64,
    ) -> Transition {
        self.drive(TimerInput::Collapse { min_elapsed_secs }, store, now_ms)
    }

    pub fn reset<S: SnapshotStore + ?Sized>(&mut self, store: &mut S, now_ms: u64) -> Transition {
        self.drive(TimerInput::Reset, store, now_ms)
    }

    /// Stop ticking without touching state or storage (teardown).
    pub fn detach(&mut self) {
        self.ticker.cancel();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn unchanged(&self) -> Transition {
        Transition {
            state: self.state,
            outcome: None,
            changed: false,
        }
    }

    fn drive<S: SnapshotStore + ?Sized>(
        &mut self,
        input: TimerInput,
        store: &mut S,
        now_ms: u64,
    ) -> Transition {
        let transition = self.state.apply(input, now_ms);
        if !transition.changed {
            return transition;
        }
        let was_running = self.state.is_running();
        self.state = transition.state;
        debug!(
            key = %self.key,
            ?input,
            phase = ?self.state.phase,
            remaining = self.state.remaining_seconds,
            "SessionTimer transition"
        );

        match self.state.phase {
            TimerPhase::Running => {
                if !was_running || !self.ticker.is_armed() {
                    self.ticker.arm();
                }
                self.persist(store);
            }
            TimerPhase::Paused => {
                self.ticker.cancel();
                self.persist(store);
            }
            TimerPhase::Finished | TimerPhase::Idle => {
                self.ticker.cancel();
                self.forget(store);
            }
        }
        transition
    }

    fn persist<S: SnapshotStore + ?Sized>(&self, store: &mut S) {
        if let Err(e) = store.save_snapshot(&self.key, &self.state) {
            warn!(key = %self.key, error = %e, "timer snapshot write failed");
        }
    }

    fn forget<S: SnapshotStore + ?Sized>(&self, store: &mut S) {
        if let Err(e) = store.delete_snapshot(&self.key) {
            warn!(key = %self.key, error = %e, "timer snapshot delete failed");
        }
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.ticker.cancel();
    }
}
