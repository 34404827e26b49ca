//! Session timer state machine.
//!
//! The machine is a pure function `(state, input, now) -> transition`. It has
//! no internal thread; the caller feeds it one `Tick` per second while it is
//! running and a `Rehydrate` after a suspension or restart.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Finished
//!           |                                  ^
//!           +------ tick to zero / finish -----+
//! collapse / reset: -> Idle
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Durable timer state. This is exactly what gets persisted as a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTimerState {
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    /// Capsule target at the time the state was created.
    pub target_seconds: u64,
    pub last_update_epoch_ms: u64,
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerInput {
    Start,
    Pause,
    Resume,
    Tick,
    /// Force `Finished`. With `complete_on_finish` the full capsule target is
    /// credited, otherwise the elapsed time.
    Finish { complete_on_finish: bool },
    /// Background the session without finishing it.
    Collapse { min_elapsed_secs: u64 },
    Reset,
    /// Apply the wall-clock delta since the last update (restart or
    /// visibility regained).
    Rehydrate,
}

/// Something the ledger must hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TimerOutcome {
    /// Countdown reached zero on its own.
    GoalReached { elapsed_seconds: u64 },
    /// User finished the session.
    Finished {
        elapsed_seconds: u64,
        complete_on_finish: bool,
    },
    /// Session collapsed after enough time to earn partial credit.
    Collapsed { elapsed_seconds: u64 },
    /// Session collapsed too early; nothing is credited.
    Discarded { elapsed_seconds: u64 },
}

/// Result of applying one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionTimerState,
    pub outcome: Option<TimerOutcome>,
    /// False when the input was not valid in the current phase.
    pub changed: bool,
}

impl SessionTimerState {
    /// A fresh idle timer for a capsule of `target_seconds`.
    pub fn new(target_seconds: u64) -> Self {
        Self {
            phase: TimerPhase::Idle,
            remaining_seconds: target_seconds,
            target_seconds,
            last_update_epoch_ms: 0,
        }
    }

    /// An idle timer for a capsule already completed today.
    pub fn completed(target_seconds: u64) -> Self {
        Self {
            remaining_seconds: 0,
            ..Self::new(target_seconds)
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.target_seconds.saturating_sub(self.remaining_seconds)
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// 0.0 .. 1.0 progress within the capsule.
    pub fn progress(&self) -> f64 {
        if self.target_seconds == 0 {
            return 0.0;
        }
        self.elapsed_seconds() as f64 / self.target_seconds as f64
    }

    /// Apply `input` at wall-clock time `now_ms`.
    pub fn apply(&self, input: TimerInput, now_ms: u64) -> Transition {
        let mut next = *self;
        let outcome = match (self.phase, input) {
            (TimerPhase::Idle | TimerPhase::Finished, TimerInput::Start) => {
                if next.remaining_seconds == 0 {
                    next.remaining_seconds = next.target_seconds;
                }
                next.phase = TimerPhase::Running;
                next.last_update_epoch_ms = now_ms;
                None
            }
            (TimerPhase::Paused, TimerInput::Start | TimerInput::Resume) => {
                next.phase = TimerPhase::Running;
                next.last_update_epoch_ms = now_ms;
                None
            }
            (TimerPhase::Running, TimerInput::Pause) => {
                next.phase = TimerPhase::Paused;
                next.last_update_epoch_ms = now_ms;
                None
            }
            (TimerPhase::Running, TimerInput::Tick) => {
                next.remaining_seconds = next.remaining_seconds.saturating_sub(1);
                next.last_update_epoch_ms = now_ms;
                next.finish_if_elapsed()
            }
            (TimerPhase::Running, TimerInput::Rehydrate) => {
                let gap_ms = now_ms.saturating_sub(next.last_update_epoch_ms);
                let gap_secs = gap_ms / 1000;
                next.remaining_seconds = next.remaining_seconds.saturating_sub(gap_secs);
                // Keep the sub-second remainder for the next rehydrate.
                next.last_update_epoch_ms += gap_secs * 1000;
                next.finish_if_elapsed()
            }
            (
                TimerPhase::Idle | TimerPhase::Running | TimerPhase::Paused,
                TimerInput::Finish { complete_on_finish },
            ) => {
                let elapsed_seconds = next.elapsed_seconds();
                next.phase = TimerPhase::Finished;
                next.remaining_seconds = 0;
                next.last_update_epoch_ms = now_ms;
                Some(TimerOutcome::Finished {
                    elapsed_seconds,
                    complete_on_finish,
                })
            }
            (
                TimerPhase::Running | TimerPhase::Paused,
                TimerInput::Collapse { min_elapsed_secs },
            ) => {
                let elapsed_seconds = next.elapsed_seconds();
                next = SessionTimerState::new(next.target_seconds);
                next.last_update_epoch_ms = now_ms;
                if elapsed_seconds > min_elapsed_secs {
                    Some(TimerOutcome::Collapsed { elapsed_seconds })
                } else {
                    Some(TimerOutcome::Discarded { elapsed_seconds })
                }
            }
            (_, TimerInput::Reset) => {
                next = SessionTimerState::new(next.target_seconds);
                next.last_update_epoch_ms = now_ms;
                None
            }
            _ => {
                return Transition {
                    state: *self,
                    outcome: None,
                    changed: false,
                }
            }
        };
        Transition {
            state: next,
            outcome,
            changed: true,
        }
    }

    fn finish_if_elapsed(&mut self) -> Option<TimerOutcome> {
        if self.remaining_seconds > 0 {
            return None;
        }
        self.phase = TimerPhase::Finished;
        Some(TimerOutcome::GoalReached {
            elapsed_seconds: self.target_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_772_442_000_000;

    fn running(remaining: u64, target: u64, last: u64) -> SessionTimerState {
        SessionTimerState {
            phase: TimerPhase::Running,
            remaining_seconds: remaining,
            target_seconds: target,
            last_update_epoch_ms: last,
        }
    }

    #[test]
    fn start_pause_resume() {
        let idle = SessionTimerState::new(600);
        let t = idle.apply(TimerInput::Start, NOW);
        assert!(t.changed);
        assert_eq!(t.state.phase, TimerPhase::Running);
        assert_eq!(t.state.last_update_epoch_ms, NOW);

        let t = t.state.apply(TimerInput::Pause, NOW + 5_000);
        assert_eq!(t.state.phase, TimerPhase::Paused);

        let t = t.state.apply(TimerInput::Resume, NOW + 60_000);
        assert_eq!(t.state.phase, TimerPhase::Running);
        assert_eq!(t.state.remaining_seconds, 600);
    }

    #[test]
    fn start_from_zero_resets_to_target() {
        let done = SessionTimerState::completed(300);
        let t = done.apply(TimerInput::Start, NOW);
        assert_eq!(t.state.remaining_seconds, 300);
    }

    #[test]
    fn invalid_inputs_do_not_change_state() {
        let idle = SessionTimerState::new(600);
        for input in [TimerInput::Pause, TimerInput::Resume, TimerInput::Tick] {
            let t = idle.apply(input, NOW);
            assert!(!t.changed);
            assert_eq!(t.state, idle);
        }
        let running = running(10, 600, NOW);
        assert!(!running.apply(TimerInput::Start, NOW).changed);
    }

    #[test]
    fn tick_to_zero_reaches_goal() {
        let mut state = running(2, 600, NOW);
        let t = state.apply(TimerInput::Tick, NOW + 1_000);
        assert!(t.outcome.is_none());
        state = t.state;
        let t = state.apply(TimerInput::Tick, NOW + 2_000);
        assert_eq!(t.state.phase, TimerPhase::Finished);
        assert_eq!(
            t.outcome,
            Some(TimerOutcome::GoalReached {
                elapsed_seconds: 600
            })
        );
    }

    #[test]
    fn rehydrate_applies_wall_clock_gap() {
        let state = running(100, 600, NOW - 37_000);
        let t = state.apply(TimerInput::Rehydrate, NOW);
        assert_eq!(t.state.remaining_seconds, 63);
        assert_eq!(t.state.phase, TimerPhase::Running);
        assert!(t.outcome.is_none());
    }

    #[test]
    fn rehydrate_past_zero_finishes() {
        let state = running(10, 600, NOW - 20_000);
        let t = state.apply(TimerInput::Rehydrate, NOW);
        assert_eq!(t.state.phase, TimerPhase::Finished);
        assert_eq!(t.state.remaining_seconds, 0);
        assert!(matches!(t.outcome, Some(TimerOutcome::GoalReached { .. })));
    }

    #[test]
    fn rehydrate_keeps_sub_second_remainder() {
        let state = running(100, 600, NOW - 1_500);
        let t = state.apply(TimerInput::Rehydrate, NOW);
        assert_eq!(t.state.remaining_seconds, 99);
        assert_eq!(t.state.last_update_epoch_ms, NOW - 500);
    }

    #[test]
    fn paused_rehydrate_applies_no_delta() {
        let mut state = running(100, 600, NOW - 37_000);
        state.phase = TimerPhase::Paused;
        let t = state.apply(TimerInput::Rehydrate, NOW);
        assert!(!t.changed);
        assert_eq!(t.state.remaining_seconds, 100);
    }

    #[test]
    fn finish_reports_elapsed_and_mode() {
        let state = running(360, 600, NOW);
        let t = state.apply(
            TimerInput::Finish {
                complete_on_finish: false,
            },
            NOW,
        );
        assert_eq!(t.state.phase, TimerPhase::Finished);
        assert_eq!(
            t.outcome,
            Some(TimerOutcome::Finished {
                elapsed_seconds: 240,
                complete_on_finish: false
            })
        );
    }

    #[test]
    fn collapse_threshold() {
        let state = running(597, 600, NOW);
        let t = state.apply(TimerInput::Collapse { min_elapsed_secs: 2 }, NOW);
        assert_eq!(t.state.phase, TimerPhase::Idle);
        assert_eq!(t.state.remaining_seconds, 600);
        assert_eq!(t.outcome, Some(TimerOutcome::Collapsed { elapsed_seconds: 3 }));

        let state = running(598, 600, NOW);
        let t = state.apply(TimerInput::Collapse { min_elapsed_secs: 2 }, NOW);
        assert_eq!(t.outcome, Some(TimerOutcome::Discarded { elapsed_seconds: 2 }));
    }

    #[test]
    fn reset_from_any_phase() {
        let state = running(10, 600, NOW);
        let t = state.apply(TimerInput::Reset, NOW);
        assert_eq!(
            t.state,
            SessionTimerState {
                phase: TimerPhase::Idle,
                remaining_seconds: 600,
                target_seconds: 600,
                last_update_epoch_ms: NOW,
            }
        );
    }

    #[test]
    fn state_serializes_for_snapshots() {
        let state = running(63, 600, NOW);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"phase\":\"running\""));
        let parsed: SessionTimerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
