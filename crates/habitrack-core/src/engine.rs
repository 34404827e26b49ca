//! Engine facade.
//!
//! [`HabitEngine`] wires the capsule scheduler, progress ledger, plateau
//! tracker, dependency gate and capsule timers to injected storage and an
//! injected clock. Every state change is published on its [`EventBus`].
//!
//! ## Day boundary
//!
//! Rollover is lazy: any query for a habit first processes every day between
//! its `last_rollover` and yesterday, in order. Each processed day settles the
//! carryover owed to the next day and feeds the plateau tracker.
//!
//! ## Foreground
//!
//! At most one timer is foreground. Starting or resuming a timer pauses the
//! previous foreground timer if it is still running (last start wins).

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, SubscriptionId};
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::gate::{DependencyGate, GateStatus};
use crate::habit::{HabitConfig, HabitKey, HabitRecord, MeasurementType};
use crate::ledger::{
    carryover_after, session_meets_minimum, CompletionEvent, CompletionKind, EventId, LedgerDay,
    Mood, ProgressLedger,
};
use crate::plateau::{GoalGrowthProposal, PlateauTracker};
use crate::scheduler::{Capsule, CapsuleScheduler, ScheduleContext};
use crate::storage::{Config, EnginePorts};
use crate::timer::{RestoreReport, SessionTimer, TimerKey, TimerOutcome, TimerPhase};

/// A completion logged by hand rather than by a timer.
#[derive(Debug, Clone, Default)]
pub struct ManualLog {
    /// Count for unit habits, minutes for timer habits. Ignored for binary habits.
    pub value: Option<f64>,
    /// Session length in minutes.
    pub duration_minutes: Option<f64>,
    /// Defaults to the first incomplete capsule.
    pub capsule_index: Option<usize>,
    pub mood: Option<Mood>,
}

/// Snapshot of one capsule timer for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub timer: TimerKey,
    pub capsule_index: usize,
    pub capsule_target: f64,
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    pub target_seconds: u64,
    pub elapsed_seconds: u64,
    pub foreground: bool,
}

/// Outcome of finishing or collapsing a timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerResult {
    pub timer: TimerView,
    pub completion: Option<CompletionEvent>,
}

fn missing_timer(key: &TimerKey) -> CoreError {
    CoreError::Custom(format!("timer {key} is not loaded"))
}

fn minutes_to_seconds(minutes: f64) -> u64 {
    (minutes * 60.0).round().max(0.0) as u64
}

pub struct HabitEngine<S: EnginePorts> {
    store: S,
    config: Config,
    clock: Box<dyn Clock>,
    bus: EventBus,
    scheduler: CapsuleScheduler,
    ledger: ProgressLedger,
    plateau: PlateauTracker,
    timers: HashMap<TimerKey, SessionTimer>,
    foreground: Option<TimerKey>,
}

impl<S: EnginePorts> HabitEngine<S> {
    pub fn new(store: S, config: Config, clock: impl Clock + 'static) -> Self {
        Self {
            scheduler: CapsuleScheduler::with_config(config.scheduler.clone()),
            plateau: PlateauTracker::with_config(config.plateau.clone()),
            ledger: ProgressLedger::new(),
            store,
            config,
            clock: Box::new(clock),
            bus: EventBus::new(),
            timers: HashMap::new(),
            foreground: None,
        }
    }

    pub fn with_system_clock(store: S, config: Config) -> Self {
        Self::new(store, config, SystemClock)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn foreground(&self) -> Option<&TimerKey> {
        self.foreground.as_ref()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.bus.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn publish(&mut self, event: Event) {
        self.bus.publish(&event);
    }

    fn load(&self, key: &HabitKey) -> Result<HabitRecord> {
        self.store
            .get_habit(key)?
            .ok_or_else(|| CoreError::HabitNotFound(key.to_string()))
    }

    // ── Habits ───────────────────────────────────────────────────────

    /// Create or edit a habit.
    ///
    /// Editing keeps the plateau, carryover and rollover state. Changing the
    /// goal drops any pending growth proposal.
    ///
    /// # Errors
    /// Validation errors, a dependency cycle, or a storage failure.
    pub fn upsert_habit(&mut self, config: HabitConfig) -> Result<HabitRecord> {
        config.validate()?;
        let edges: HashMap<HabitKey, Option<HabitKey>> = self
            .store
            .list_habits()?
            .into_iter()
            .map(|r| (r.config.key.clone(), r.config.dependent_on_habit_id.clone()))
            .collect();
        DependencyGate::check_acyclic(&config, |key| edges.get(key).cloned().flatten())?;

        let record = match self.store.get_habit(&config.key)? {
            Some(mut record) => {
                if record.config.current_daily_goal != config.current_daily_goal {
                    record.pending_proposal = None;
                    record.set_goal(config.current_daily_goal, self.today());
                }
                record.plateau.plateau_days_required = config.plateau_days_required;
                record.config = config;
                record
            }
            None => {
                let mut record = HabitRecord::new(config);
                record.last_rollover = self.today().pred_opt();
                record
            }
        };
        self.store.put_habit(&record)?;
        info!(
            habit = %record.key(),
            goal = record.config.current_daily_goal,
            "HabitEngine::upsert_habit"
        );
        Ok(record)
    }

    /// Remove a habit, its live timers and today's timer snapshots.
    /// Logged completions are kept.
    ///
    /// # Errors
    /// `HabitNotFound` if the habit does not exist.
    pub fn remove_habit(&mut self, key: &HabitKey) -> Result<HabitRecord> {
        let record = self.load(key)?;
        let today = self.today();
        let count = self
            .scheduler
            .chunk_count(&record.config, record.adjusted_goal_on(today));

        let live: Vec<TimerKey> = self
            .timers
            .keys()
            .filter(|k| &k.habit_key == key)
            .cloned()
            .collect();
        let labels = (0..count).map(|i| TimerKey::new(key.clone(), Capsule::label_for(i), today));
        for timer_key in live.into_iter().chain(labels) {
            if let Some(mut timer) = self.timers.remove(&timer_key) {
                timer.detach();
            }
            if let Err(e) = self.store.delete_snapshot(&timer_key) {
                warn!(key = %timer_key, error = %e, "timer snapshot delete failed");
            }
        }
        if self.foreground.as_ref().is_some_and(|k| &k.habit_key == key) {
            self.set_foreground(None);
        }

        self.store.remove_habit(key)?;
        info!(habit = %key, "HabitEngine::remove_habit");
        Ok(record)
    }

    /// A habit with its day boundaries processed.
    pub fn habit(&mut self, key: &HabitKey) -> Result<HabitRecord> {
        self.ensure_rolled_over(key)
    }

    /// Every habit, ordered by key, with day boundaries processed.
    pub fn habits(&mut self) -> Result<Vec<HabitRecord>> {
        let keys: Vec<HabitKey> = self
            .store
            .list_habits()?
            .into_iter()
            .map(|r| r.config.key)
            .collect();
        keys.iter().map(|k| self.ensure_rolled_over(k)).collect()
    }

    // ── Day boundary ─────────────────────────────────────────────────

    /// Process every day boundary between the last rollover and yesterday.
    ///
    /// # Errors
    /// `HabitNotFound` or a storage failure.
    pub fn ensure_rolled_over(&mut self, key: &HabitKey) -> Result<HabitRecord> {
        let mut record = self.load(key)?;
        let Some(yesterday) = self.today().pred_opt() else {
            return Ok(record);
        };
        let Some(last) = record.last_rollover else {
            record.last_rollover = Some(yesterday);
            self.store.put_habit(&record)?;
            return Ok(record);
        };
        if last >= yesterday {
            return Ok(record);
        }

        let first = last + Duration::days(1);
        let events = self.store.events_between(key, first, yesterday)?;
        let mut day = first;
        while day <= yesterday {
            self.roll_day(&mut record, day, &events);
            day += Duration::days(1);
        }
        self.store.put_habit(&record)?;
        Ok(record)
    }

    fn roll_day(&mut self, record: &mut HabitRecord, day: NaiveDate, events: &[CompletionEvent]) {
        let qualified = self.ledger.qualifies(record, events, day);
        let carryover = carryover_after(record, events, day);
        let outcome = self.plateau.end_of_day(record, day, qualified);
        record.carryover = carryover;
        record.last_rollover = Some(day);

        let carried = carryover.map(|c| c.value).unwrap_or(0.0);
        info!(
            habit = %record.key(),
            %day,
            qualified,
            carryover = carried,
            streak = outcome.completions_after,
            "day rolled over"
        );
        let at = self.clock.now();
        self.publish(Event::DayRolledOver {
            habit_key: record.key().clone(),
            date: day,
            qualified,
            carryover: carried,
            at,
        });
        if let Some(proposal) = outcome.proposal {
            self.publish(Event::GoalGrowthProposed { proposal, at });
        }
    }

    // ── Scheduling and ledger ────────────────────────────────────────

    /// Today's capsules for a habit.
    pub fn capsules_for_today(&mut self, key: &HabitKey) -> Result<Vec<Capsule>> {
        let record = self.ensure_rolled_over(key)?;
        self.capsules_for(&record)
    }

    fn capsules_for(&self, record: &HabitRecord) -> Result<Vec<Capsule>> {
        let today = self.today();
        let completions = self.store.events_between(record.key(), today, today)?;
        Ok(self.scheduler.capsules(
            &record.config,
            ScheduleContext {
                carryover: record.carryover_on(today),
                completions: &completions,
            },
        ))
    }

    /// Today's ledger for a habit.
    pub fn ledger(&mut self, key: &HabitKey) -> Result<LedgerDay> {
        let record = self.ensure_rolled_over(key)?;
        self.ledger.day(&self.store, &record, self.today())
    }

    /// Ledger for any date up to today.
    pub fn ledger_on(&mut self, key: &HabitKey, date: NaiveDate) -> Result<LedgerDay> {
        let record = self.ensure_rolled_over(key)?;
        self.ledger.day(&self.store, &record, date)
    }

    /// Whether the habit's prerequisite allows starting it today.
    pub fn gate_status(&mut self, key: &HabitKey) -> Result<GateStatus> {
        let record = self.ensure_rolled_over(key)?;
        let Some(prerequisite) = record.config.dependent_on_habit_id.clone() else {
            return Ok(GateStatus::Unlocked);
        };
        let prerequisite_day = match self.store.get_habit(&prerequisite)? {
            Some(_) => Some(self.ledger(&prerequisite)?),
            None => None,
        };
        Ok(DependencyGate::evaluate(
            &record.config,
            prerequisite_day.as_ref(),
        ))
    }

    pub fn is_locked(&mut self, key: &HabitKey) -> Result<bool> {
        Ok(self.gate_status(key)?.is_locked())
    }

    // ── Completions ──────────────────────────────────────────────────

    /// Log a completion without a timer.
    ///
    /// Binary habits always log 1. Timer habits take minutes from
    /// `duration_minutes` or `value`.
    ///
    /// # Errors
    /// A missing or non-positive value, or a capsule index out of range.
    pub fn log_manual(&mut self, key: &HabitKey, log: ManualLog) -> Result<CompletionEvent> {
        let record = self.ensure_rolled_over(key)?;
        let (value, duration_seconds) = match record.config.measurement_type {
            MeasurementType::Binary => (1.0, log.duration_minutes.map(minutes_to_seconds)),
            MeasurementType::Timer => {
                let minutes = log.duration_minutes.or(log.value).ok_or_else(|| {
                    ValidationError::invalid("value", "timer habits need a duration in minutes")
                })?;
                (minutes, Some(minutes_to_seconds(minutes)))
            }
            MeasurementType::Unit => {
                let count = log
                    .value
                    .ok_or_else(|| ValidationError::invalid("value", "a count is required"))?;
                (count, log.duration_minutes.map(minutes_to_seconds))
            }
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(ValidationError::not_positive("value", value).into());
        }

        let capsules = self.capsules_for(&record)?;
        let index = match log.capsule_index {
            Some(i) if i < capsules.len() => i,
            Some(i) => {
                return Err(CoreError::CapsuleOutOfRange {
                    habit: key.to_string(),
                    index: i,
                    count: capsules.len(),
                })
            }
            None => capsules
                .iter()
                .find(|c| !c.is_completed)
                .map(|c| c.index)
                .unwrap_or(capsules.len().saturating_sub(1)),
        };

        let mut event =
            CompletionEvent::full(key.clone(), index, value, self.today(), self.clock.now())
                .with_mood(log.mood);
        event.duration_seconds = duration_seconds;
        self.record_completion(event)
    }

    /// Remove a logged completion by id.
    ///
    /// # Errors
    /// `LedgerError::MissingEventId` without an id, `EventNotFound` when the
    /// id is unknown for this habit.
    pub fn uncomplete(
        &mut self,
        key: &HabitKey,
        event_id: Option<&EventId>,
    ) -> Result<CompletionEvent> {
        self.load(key)?;
        let removed = self.ledger.uncomplete(&mut self.store, key, event_id)?;
        let at = self.clock.now();
        self.publish(Event::CompletionRemoved {
            habit_key: key.clone(),
            event_id: removed.id.clone(),
            value: removed.value,
            at,
        });
        Ok(removed)
    }

    fn record_completion(&mut self, mut event: CompletionEvent) -> Result<CompletionEvent> {
        let record = self.load(&event.habit_key)?;
        let habit = &record.config;

        let below_minimum = habit.is_weekly_session()
            && event.kind == CompletionKind::Full
            && !session_meets_minimum(habit, &event);
        if below_minimum {
            event.kind = CompletionKind::Partial;
        }

        let was_complete = self
            .ledger
            .day(&self.store, &record, event.date)?
            .is_daily_complete;
        let dependents: Vec<HabitKey> = if was_complete {
            Vec::new()
        } else {
            self.store
                .list_habits()?
                .into_iter()
                .filter(|r| r.config.dependent_on_habit_id.as_ref() == Some(record.key()))
                .map(|r| r.config.key)
                .collect()
        };

        let event_id = self.ledger.record(&mut self.store, event.clone())?;
        let at = self.clock.now();
        self.publish(Event::CompletionLogged {
            habit_key: event.habit_key.clone(),
            event_id: event_id.clone(),
            capsule_index: event.capsule_index,
            value: event.value,
            kind: event.kind,
            at,
        });

        if below_minimum {
            let duration_minutes = event
                .duration_seconds
                .map(|s| s as f64 / 60.0)
                .unwrap_or(event.value);
            info!(habit = %event.habit_key, duration_minutes, "weekly session below minimum");
            self.publish(Event::SessionBelowMinimum {
                habit_key: event.habit_key.clone(),
                event_id,
                duration_minutes,
                min_duration_minutes: habit.weekly_session_min_duration.unwrap_or_default(),
                at,
            });
        }

        if !dependents.is_empty()
            && self
                .ledger
                .day(&self.store, &record, event.date)?
                .is_daily_complete
        {
            for dependent in dependents {
                self.publish(Event::HabitUnlocked {
                    habit_key: dependent,
                    prerequisite: record.key().clone(),
                    at,
                });
            }
        }
        Ok(event)
    }

    // ── Goal growth ──────────────────────────────────────────────────

    pub fn pending_proposal(&mut self, key: &HabitKey) -> Result<Option<GoalGrowthProposal>> {
        Ok(self.ensure_rolled_over(key)?.pending_proposal)
    }

    /// Raise the goal to the pending proposal and start a new plateau.
    ///
    /// # Errors
    /// Fails if no proposal is pending.
    pub fn accept_growth_proposal(&mut self, key: &HabitKey) -> Result<GoalGrowthProposal> {
        let mut record = self.ensure_rolled_over(key)?;
        let today = self.today();
        let proposal = self
            .plateau
            .accept(&mut record, today)
            .ok_or_else(|| no_proposal(key))?;
        record.config.validate()?;
        self.store.put_habit(&record)?;

        let at = self.clock.now();
        self.publish(Event::GoalGrowthAccepted {
            habit_key: key.clone(),
            previous_goal: proposal.current_goal,
            new_goal: proposal.new_goal,
            at,
        });
        Ok(proposal)
    }

    /// Keep the goal and start a new plateau.
    ///
    /// # Errors
    /// Fails if no proposal is pending.
    pub fn dismiss_growth_proposal(&mut self, key: &HabitKey) -> Result<GoalGrowthProposal> {
        let mut record = self.ensure_rolled_over(key)?;
        let proposal = self
            .plateau
            .dismiss(&mut record)
            .ok_or_else(|| no_proposal(key))?;
        self.store.put_habit(&record)?;
        info!(habit = %key, "HabitEngine::dismiss_growth_proposal");
        Ok(proposal)
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Start the timer for capsule `index`, pausing any other running
    /// foreground timer. Starting a paused timer resumes it.
    ///
    /// # Errors
    /// `HabitLocked` while the prerequisite is incomplete, `CapsuleOutOfRange`,
    /// or a validation error for non-timer habits.
    pub fn start_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerView> {
        self.activate(key, index, false)
    }

    pub fn resume_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerView> {
        self.activate(key, index, true)
    }

    pub fn pause_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerView> {
        let timer_key = self.timer_entry(key, index)?;
        self.pause_key(&timer_key);
        self.view(&timer_key)
    }

    /// Finish with the configured credit mode.
    pub fn finish_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerResult> {
        let complete_on_finish = self.config.timer.complete_on_finish;
        self.finish_timer_with(key, index, complete_on_finish)
    }

    pub fn finish_timer_with(
        &mut self,
        key: &HabitKey,
        index: usize,
        complete_on_finish: bool,
    ) -> Result<TimerResult> {
        let timer_key = self.timer_entry(key, index)?;
        let now_ms = self.clock.now_ms();
        let transition = match self.timers.get_mut(&timer_key) {
            Some(timer) => timer.finish(complete_on_finish, &mut self.store, now_ms),
            None => return Err(missing_timer(&timer_key)),
        };
        let completion = match transition.outcome {
            Some(outcome) => self.settle(&timer_key, outcome)?,
            None => None,
        };
        Ok(TimerResult {
            timer: self.view(&timer_key)?,
            completion,
        })
    }

    /// Background the session. Enough elapsed time earns partial credit.
    pub fn collapse_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerResult> {
        let timer_key = self.timer_entry(key, index)?;
        let min_elapsed_secs = self.config.timer.collapse_min_elapsed_secs;
        let now_ms = self.clock.now_ms();
        let transition = match self.timers.get_mut(&timer_key) {
            Some(timer) => timer.collapse(min_elapsed_secs, &mut self.store, now_ms),
            None => return Err(missing_timer(&timer_key)),
        };
        let completion = match transition.outcome {
            Some(outcome) => self.settle(&timer_key, outcome)?,
            None => None,
        };
        Ok(TimerResult {
            timer: self.view(&timer_key)?,
            completion,
        })
    }

    pub fn reset_timer(&mut self, key: &HabitKey, index: usize) -> Result<TimerView> {
        let timer_key = self.timer_entry(key, index)?;
        let now_ms = self.clock.now_ms();
        let transition = match self.timers.get_mut(&timer_key) {
            Some(timer) => timer.reset(&mut self.store, now_ms),
            None => return Err(missing_timer(&timer_key)),
        };
        if transition.changed {
            let at = self.clock.now();
            self.publish(Event::TimerReset {
                timer: timer_key.clone(),
                at,
            });
        }
        if self.foreground.as_ref() == Some(&timer_key) {
            self.set_foreground(None);
        }
        self.view(&timer_key)
    }

    /// Current state of a capsule timer, restoring it from storage if needed.
    pub fn timer_status(&mut self, key: &HabitKey, index: usize) -> Result<TimerView> {
        let timer_key = self.timer_entry(key, index)?;
        self.view(&timer_key)
    }

    /// One 1 Hz tick of the foreground timer.
    ///
    /// Returns `None` when there is no foreground timer.
    pub fn tick(&mut self) -> Result<Option<TimerView>> {
        self.drive_foreground(false)
    }

    /// Visibility regained: apply the wall-clock gap to the foreground timer.
    pub fn rehydrate(&mut self) -> Result<Option<TimerView>> {
        self.drive_foreground(true)
    }

    /// Timers started on an earlier day keep the capsule they started with;
    /// today's timers are checked against today's capsule list first.
    fn drive_foreground(&mut self, rehydrate: bool) -> Result<Option<TimerView>> {
        let Some(timer_key) = self.foreground.clone() else {
            return Ok(None);
        };
        let Some(index) = self.timers.get(&timer_key).map(SessionTimer::capsule_index) else {
            self.foreground = None;
            return Ok(None);
        };
        if timer_key.date == self.today() {
            let record = self.ensure_rolled_over(&timer_key.habit_key)?;
            let capsules = self.capsules_for(&record)?;
            match self.revalidate(&timer_key, capsules.get(index)) {
                Liveness::Live => {}
                Liveness::Settled => return self.view(&timer_key).map(Some),
                Liveness::Discarded => return Ok(None),
            }
        }

        let now_ms = self.clock.now_ms();
        let transition = match self.timers.get_mut(&timer_key) {
            Some(timer) if rehydrate => timer.rehydrate(&mut self.store, now_ms),
            Some(timer) => timer.tick(&mut self.store, now_ms),
            None => {
                self.foreground = None;
                return Ok(None);
            }
        };
        if let Some(outcome) = transition.outcome {
            self.settle(&timer_key, outcome)?;
        }
        self.view(&timer_key).map(Some)
    }

    fn activate(&mut self, key: &HabitKey, index: usize, resume: bool) -> Result<TimerView> {
        if let GateStatus::Locked { prerequisite } = self.gate_status(key)? {
            return Err(CoreError::HabitLocked {
                habit: key.to_string(),
                prerequisite: prerequisite.to_string(),
            });
        }
        let timer_key = self.timer_entry(key, index)?;
        if let Some(previous) = self.foreground.clone() {
            if previous != timer_key {
                self.pause_key(&previous);
            }
        }

        let now_ms = self.clock.now_ms();
        let (transition, was_paused) = match self.timers.get_mut(&timer_key) {
            Some(timer) => {
                let was_paused = timer.phase() == TimerPhase::Paused;
                let transition = if resume {
                    timer.resume(&mut self.store, now_ms)
                } else {
                    timer.start(&mut self.store, now_ms)
                };
                (transition, was_paused)
            }
            None => return Err(missing_timer(&timer_key)),
        };

        if transition.changed {
            let at = self.clock.now();
            let event = if was_paused {
                Event::TimerResumed {
                    timer: timer_key.clone(),
                    remaining_seconds: transition.state.remaining_seconds,
                    at,
                }
            } else {
                Event::TimerStarted {
                    timer: timer_key.clone(),
                    capsule_index: index,
                    target_seconds: transition.state.target_seconds,
                    at,
                }
            };
            self.publish(event);
        }
        if transition.state.is_running() {
            self.set_foreground(Some(timer_key.clone()));
        }
        self.view(&timer_key)
    }

    fn pause_key(&mut self, timer_key: &TimerKey) {
        let now_ms = self.clock.now_ms();
        let Some(timer) = self.timers.get_mut(timer_key) else {
            return;
        };
        let transition = timer.pause(&mut self.store, now_ms);
        if transition.changed {
            let at = self.clock.now();
            self.publish(Event::TimerPaused {
                timer: timer_key.clone(),
                remaining_seconds: transition.state.remaining_seconds,
                at,
            });
        }
    }

    fn set_foreground(&mut self, current: Option<TimerKey>) {
        if self.foreground == current {
            return;
        }
        let previous = std::mem::replace(&mut self.foreground, current.clone());
        debug!(?previous, ?current, "HabitEngine: foreground changed");
        let at = self.clock.now();
        self.publish(Event::ActiveTimerChanged {
            previous,
            current,
            at,
        });
    }

    /// Load the timer for capsule `index` of `key` today, restoring it from
    /// storage on first access.
    fn timer_entry(&mut self, key: &HabitKey, index: usize) -> Result<TimerKey> {
        let record = self.ensure_rolled_over(key)?;
        if record.config.measurement_type != MeasurementType::Timer {
            return Err(ValidationError::invalid(
                "measurement_type",
                format!("'{key}' is not a timer habit"),
            )
            .into());
        }
        let capsules = self.capsules_for(&record)?;
        let capsule = capsules
            .get(index)
            .cloned()
            .ok_or_else(|| CoreError::CapsuleOutOfRange {
                habit: key.to_string(),
                index,
                count: capsules.len(),
            })?;
        let timer_key = TimerKey::new(key.clone(), capsule.label.clone(), self.today());

        if self.timers.contains_key(&timer_key) {
            match self.revalidate(&timer_key, Some(&capsule)) {
                Liveness::Live | Liveness::Settled => return Ok(timer_key),
                Liveness::Discarded => {}
            }
        }

        let now_ms = self.clock.now_ms();
        let (timer, report, outcome) =
            SessionTimer::restore(timer_key.clone(), &capsule, &mut self.store, now_ms);
        debug!(key = %timer_key, ?report, "HabitEngine: timer loaded");
        let running = timer.phase() == TimerPhase::Running;
        self.timers.insert(timer_key.clone(), timer);

        match report {
            RestoreReport::StaleDiscarded {
                stored_target,
                fresh_target,
            } => self.discarded(&timer_key, stored_target, fresh_target),
            RestoreReport::FinishedWhileAway => {
                if let Some(outcome) = outcome {
                    self.settle(&timer_key, outcome)?;
                }
            }
            RestoreReport::Fresh
            | RestoreReport::Resumed { .. }
            | RestoreReport::AlreadyCompleted => {}
        }
        if running && self.foreground.is_none() {
            self.set_foreground(Some(timer_key.clone()));
        }
        Ok(timer_key)
    }

    /// Hold a live timer to the same checks a restore applies.
    ///
    /// A capsule the ledger already shows complete settles the timer at zero
    /// without credit. A changed target, or a capsule that no longer exists,
    /// drops the timer and its snapshot.
    fn revalidate(&mut self, timer_key: &TimerKey, capsule: Option<&Capsule>) -> Liveness {
        let Some(timer) = self.timers.get(timer_key) else {
            return Liveness::Discarded;
        };
        let state = *timer.state();
        let settled = state.phase == TimerPhase::Finished
            || (state.phase == TimerPhase::Idle && state.remaining_seconds == 0);

        match capsule {
            Some(capsule) if capsule.is_completed => {
                if settled {
                    return Liveness::Live;
                }
                if let Some(mut live) = self.timers.remove(timer_key) {
                    live.detach();
                }
                let now_ms = self.clock.now_ms();
                let (timer, report, _) =
                    SessionTimer::restore(timer_key.clone(), capsule, &mut self.store, now_ms);
                info!(key = %timer_key, ?report, "live timer settled: capsule already complete");
                self.timers.insert(timer_key.clone(), timer);
                if self.foreground.as_ref() == Some(timer_key) {
                    self.set_foreground(None);
                }
                Liveness::Settled
            }
            Some(capsule) if capsule.target_seconds() == state.target_seconds => Liveness::Live,
            _ => {
                let fresh_target = capsule.map(Capsule::target_seconds).unwrap_or(0);
                warn!(
                    key = %timer_key,
                    stored_target = state.target_seconds,
                    fresh_target,
                    "discarding live timer for an edited goal"
                );
                if let Some(mut stale) = self.timers.remove(timer_key) {
                    stale.detach();
                }
                if let Err(e) = self.store.delete_snapshot(timer_key) {
                    warn!(key = %timer_key, error = %e, "timer snapshot delete failed");
                }
                if self.foreground.as_ref() == Some(timer_key) {
                    self.set_foreground(None);
                }
                self.discarded(timer_key, state.target_seconds, fresh_target);
                Liveness::Discarded
            }
        }
    }

    fn discarded(&mut self, timer_key: &TimerKey, stored_target: u64, fresh_target: u64) {
        let at = self.clock.now();
        self.publish(Event::SnapshotDiscarded {
            timer: timer_key.clone(),
            stored_target,
            fresh_target,
            at,
        });
    }

    /// Publish a timer outcome and log its credit.
    fn settle(
        &mut self,
        timer_key: &TimerKey,
        outcome: TimerOutcome,
    ) -> Result<Option<CompletionEvent>> {
        let Some(timer) = self.timers.get(timer_key) else {
            return Err(missing_timer(timer_key));
        };
        let credit = timer.credit(outcome);
        let capsule_index = timer.capsule_index();
        let at = self.clock.now();

        let event = match outcome {
            TimerOutcome::GoalReached { elapsed_seconds } => Event::GoalReached {
                timer: timer_key.clone(),
                elapsed_seconds,
                at,
            },
            TimerOutcome::Finished {
                elapsed_seconds,
                complete_on_finish,
            } => Event::TimerFinished {
                timer: timer_key.clone(),
                elapsed_seconds,
                complete_on_finish,
                at,
            },
            TimerOutcome::Collapsed { elapsed_seconds } => Event::TimerCollapsed {
                timer: timer_key.clone(),
                elapsed_seconds,
                credited: true,
                at,
            },
            TimerOutcome::Discarded { elapsed_seconds } => Event::TimerCollapsed {
                timer: timer_key.clone(),
                elapsed_seconds,
                credited: false,
                at,
            },
        };
        if self.foreground.as_ref() == Some(timer_key) {
            self.set_foreground(None);
        }
        self.publish(event);

        let Some(credit) = credit else {
            return Ok(None);
        };
        if credit.value <= 0.0 {
            debug!(key = %timer_key, "nothing to credit");
            return Ok(None);
        }
        let habit_key = timer_key.habit_key.clone();
        let completion = match credit.kind {
            CompletionKind::Full => {
                let event = CompletionEvent::full(
                    habit_key,
                    capsule_index,
                    credit.value,
                    timer_key.date,
                    at,
                );
                if credit.duration_seconds > 0 {
                    event.with_duration(credit.duration_seconds)
                } else {
                    event
                }
            }
            CompletionKind::Partial => CompletionEvent::partial(
                habit_key,
                capsule_index,
                credit.value,
                credit.duration_seconds,
                timer_key.date,
                at,
            ),
        };
        self.record_completion(completion).map(Some)
    }

    fn view(&self, timer_key: &TimerKey) -> Result<TimerView> {
        let timer = self
            .timers
            .get(timer_key)
            .ok_or_else(|| missing_timer(timer_key))?;
        let state = timer.state();
        Ok(TimerView {
            timer: timer_key.clone(),
            capsule_index: timer.capsule_index(),
            capsule_target: timer.capsule_target(),
            phase: state.phase,
            remaining_seconds: state.remaining_seconds,
            target_seconds: state.target_seconds,
            elapsed_seconds: state.elapsed_seconds(),
            foreground: self.foreground.as_ref() == Some(timer_key),
        })
    }
}

/// What revalidation left of a live timer.
enum Liveness {
    Live,
    /// Replaced by a timer held at zero.
    Settled,
    /// Removed from the engine.
    Discarded,
}

fn no_proposal(key: &HabitKey) -> CoreError {
    ValidationError::invalid(
        "pending_proposal",
        format!("no goal growth proposal pending for '{key}'"),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> (HabitEngine<MemoryStore>, ManualClock) {
        let clock = ManualClock::at(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 8);
        let engine = HabitEngine::new(MemoryStore::new(), Config::default(), clock.clone());
        (engine, clock)
    }

    #[test]
    fn upsert_rejects_invalid_and_cyclic_habits() {
        let (mut engine, _) = engine();
        assert!(engine
            .upsert_habit(HabitConfig::timer("read", "Read", 0.0))
            .is_err());

        let mut a = HabitConfig::timer("a", "A", 10.0);
        engine.upsert_habit(a.clone()).unwrap();
        let mut b = HabitConfig::timer("b", "B", 10.0);
        b.dependent_on_habit_id = Some("a".into());
        engine.upsert_habit(b).unwrap();

        a.dependent_on_habit_id = Some("b".into());
        let err = engine.upsert_habit(a).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::DependencyCycle(_))
        ));
    }

    #[test]
    fn starting_a_second_timer_pauses_the_first() {
        let (mut engine, clock) = engine();
        engine.upsert_habit(HabitConfig::timer("read", "Read", 10.0)).unwrap();
        engine.upsert_habit(HabitConfig::timer("walk", "Walk", 10.0)).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(move |e| sink.borrow_mut().push(e.event_type()));

        engine.start_timer(&"read".into(), 0).unwrap();
        clock.advance_secs(5);
        let walk = engine.start_timer(&"walk".into(), 0).unwrap();
        assert!(walk.foreground);

        let read = engine.timer_status(&"read".into(), 0).unwrap();
        assert_eq!(read.phase, TimerPhase::Paused);
        assert!(!read.foreground);
        assert_eq!(engine.foreground(), Some(&walk.timer));
        assert!(seen.borrow().contains(&"TimerPaused"));
        assert_eq!(
            seen.borrow().iter().filter(|t| **t == "ActiveTimerChanged").count(),
            2
        );
    }

    #[test]
    fn non_timer_habits_have_no_timers() {
        let (mut engine, _) = engine();
        engine.upsert_habit(HabitConfig::binary("floss", "Floss")).unwrap();
        assert!(matches!(
            engine.start_timer(&"floss".into(), 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn capsule_index_out_of_range() {
        let (mut engine, _) = engine();
        engine.upsert_habit(HabitConfig::timer("read", "Read", 10.0)).unwrap();
        assert!(matches!(
            engine.start_timer(&"read".into(), 3),
            Err(CoreError::CapsuleOutOfRange { count: 1, .. })
        ));
    }

    #[test]
    fn accept_without_proposal_fails() {
        let (mut engine, _) = engine();
        engine.upsert_habit(HabitConfig::timer("read", "Read", 10.0)).unwrap();
        assert!(engine.accept_growth_proposal(&"read".into()).is_err());
        assert!(engine.dismiss_growth_proposal(&"read".into()).is_err());
    }
}
