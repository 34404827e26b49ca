//! End-to-end engine flows over the in-memory store.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use habitrack_core::{
    CompletionKind, Config, CoreError, Event, HabitConfig, HabitEngine, LedgerError, ManualClock,
    ManualLog, MemoryStore, TimerPhase,
};

/// 2026-03-02 is a Monday.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn setup() -> (HabitEngine<MemoryStore>, ManualClock, Rc<RefCell<Vec<Event>>>) {
    let clock = ManualClock::at(monday(), 8);
    let mut engine = HabitEngine::new(MemoryStore::new(), Config::default(), clock.clone());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    (engine, clock, events)
}

fn minutes(value: f64) -> ManualLog {
    ManualLog {
        duration_minutes: Some(value),
        ..ManualLog::default()
    }
}

#[test]
fn capsule_countdown_credits_the_capsule() {
    let (mut engine, clock, events) = setup();
    engine
        .upsert_habit(HabitConfig::timer("read", "Read", 30.0))
        .unwrap();

    let capsules = engine.capsules_for_today(&"read".into()).unwrap();
    assert_eq!(capsules.len(), 3);
    assert!(capsules.iter().all(|c| c.target_value == 10.0));

    let view = engine.start_timer(&"read".into(), 0).unwrap();
    assert_eq!(view.phase, TimerPhase::Running);
    assert_eq!(view.remaining_seconds, 600);
    assert!(view.foreground);

    clock.advance_secs(600);
    let view = engine.rehydrate().unwrap().unwrap();
    assert_eq!(view.phase, TimerPhase::Finished);
    assert!(engine.foreground().is_none());

    let day = engine.ledger(&"read".into()).unwrap();
    assert_eq!(day.daily_progress, 10.0);
    assert!(!day.is_daily_complete);

    let capsules = engine.capsules_for_today(&"read".into()).unwrap();
    assert!(capsules[0].is_completed);
    assert!(!capsules[1].is_completed);

    let kinds: Vec<&str> = events.borrow().iter().map(|e| e.event_type()).collect();
    assert!(kinds.contains(&"TimerStarted"));
    assert!(kinds.contains(&"GoalReached"));
    assert!(kinds.contains(&"CompletionLogged"));
}

#[test]
fn ticks_count_down_one_second_each() {
    let (mut engine, clock, _) = setup();
    engine
        .upsert_habit(HabitConfig::timer("read", "Read", 5.0))
        .unwrap();
    engine.start_timer(&"read".into(), 0).unwrap();
    for _ in 0..3 {
        clock.advance_secs(1);
        engine.tick().unwrap();
    }
    let view = engine.timer_status(&"read".into(), 0).unwrap();
    assert_eq!(view.remaining_seconds, 297);
    assert_eq!(view.elapsed_seconds, 3);
}

#[test]
fn finish_credit_modes() {
    let (mut engine, clock, _) = setup();
    engine
        .upsert_habit(HabitConfig::timer("read", "Read", 10.0))
        .unwrap();
    engine
        .upsert_habit(HabitConfig::timer("walk", "Walk", 10.0))
        .unwrap();

    engine.start_timer(&"read".into(), 0).unwrap();
    clock.advance_secs(240);
    engine.rehydrate().unwrap();
    let full = engine.finish_timer_with(&"read".into(), 0, true).unwrap();
    assert_eq!(full.completion.unwrap().value, 10.0);

    engine.start_timer(&"walk".into(), 0).unwrap();
    clock.advance_secs(240);
    engine.rehydrate().unwrap();
    let elapsed = engine.finish_timer_with(&"walk".into(), 0, false).unwrap();
    let completion = elapsed.completion.unwrap();
    assert_eq!(completion.value, 4.0);
    assert_eq!(completion.kind, CompletionKind::Full);
    assert_eq!(completion.duration_seconds, Some(240));
}

#[test]
fn collapse_keeps_partial_credit_only_after_the_minimum() {
    let (mut engine, clock, _) = setup();
    engine
        .upsert_habit(HabitConfig::timer("read", "Read", 10.0))
        .unwrap();

    engine.start_timer(&"read".into(), 0).unwrap();
    clock.advance_secs(1);
    engine.rehydrate().unwrap();
    let early = engine.collapse_timer(&"read".into(), 0).unwrap();
    assert!(early.completion.is_none());
    assert_eq!(early.timer.phase, TimerPhase::Idle);

    engine.start_timer(&"read".into(), 0).unwrap();
    clock.advance_secs(90);
    engine.rehydrate().unwrap();
    let late = engine.collapse_timer(&"read".into(), 0).unwrap();
    let completion = late.completion.unwrap();
    assert_eq!(completion.kind, CompletionKind::Partial);
    assert_eq!(completion.value, 1.5);

    // Partial credit counts toward progress but does not complete the capsule.
    let day = engine.ledger(&"read".into()).unwrap();
    assert_eq!(day.daily_progress, 1.5);
    let capsules = engine.capsules_for_today(&"read".into()).unwrap();
    assert!(!capsules[0].is_completed);
}

#[test]
fn dependency_gate_unlocks_when_prerequisite_completes() {
    let (mut engine, _, events) = setup();
    engine
        .upsert_habit(HabitConfig::binary("meditate", "Meditate"))
        .unwrap();
    let mut read = HabitConfig::timer("read", "Read", 20.0);
    read.dependent_on_habit_id = Some("meditate".into());
    engine.upsert_habit(read).unwrap();

    assert!(engine.is_locked(&"read".into()).unwrap());
    assert!(matches!(
        engine.start_timer(&"read".into(), 0),
        Err(CoreError::HabitLocked { .. })
    ));
    // Manual logs are never gated.
    engine.log_manual(&"read".into(), minutes(5.0)).unwrap();

    engine
        .log_manual(&"meditate".into(), ManualLog::default())
        .unwrap();
    assert!(!engine.is_locked(&"read".into()).unwrap());
    assert!(events.borrow().iter().any(|e| matches!(
        e,
        Event::HabitUnlocked { habit_key, .. } if habit_key.as_str() == "read"
    )));
    engine.start_timer(&"read".into(), 0).unwrap();
}

#[test]
fn missing_prerequisite_means_unlocked() {
    let (mut engine, _, _) = setup();
    let mut read = HabitConfig::timer("read", "Read", 20.0);
    read.dependent_on_habit_id = Some("ghost".into());
    engine.upsert_habit(read).unwrap();
    assert!(!engine.is_locked(&"read".into()).unwrap());
}

#[test]
fn weekly_session_below_minimum_is_partial() {
    let (mut engine, _, events) = setup();
    let mut gym = HabitConfig::timer("gym", "Gym", 45.0);
    gym.frequency_per_week = 3;
    gym.weekly_session_min_duration = Some(10.0);
    engine.upsert_habit(gym).unwrap();

    let short = engine.log_manual(&"gym".into(), minutes(7.0)).unwrap();
    assert_eq!(short.kind, CompletionKind::Partial);
    assert!(events
        .borrow()
        .iter()
        .any(|e| e.event_type() == "SessionBelowMinimum"));
    assert_eq!(engine.ledger(&"gym".into()).unwrap().weekly_progress, 0);

    let long = engine.log_manual(&"gym".into(), minutes(12.0)).unwrap();
    assert_eq!(long.kind, CompletionKind::Full);
    let day = engine.ledger(&"gym".into()).unwrap();
    assert_eq!(day.weekly_progress, 1);
    assert_eq!(day.weekly_target, 3);
    assert!(!day.is_weekly_complete);
}

#[test]
fn uncomplete_needs_an_event_id() {
    let (mut engine, _, events) = setup();
    engine
        .upsert_habit(HabitConfig::counted("pushups", "Push-ups", habitrack_core::Unit::Reps, 20.0))
        .unwrap();
    let logged = engine
        .log_manual(
            &"pushups".into(),
            ManualLog {
                value: Some(12.0),
                ..ManualLog::default()
            },
        )
        .unwrap();

    let err = engine.uncomplete(&"pushups".into(), None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Ledger(LedgerError::MissingEventId { .. })
    ));
    assert!(err.to_string().contains("no specific log found"));

    let unknown = engine.uncomplete(&"pushups".into(), Some(&"nope".into()));
    assert!(matches!(
        unknown,
        Err(CoreError::Ledger(LedgerError::EventNotFound(_)))
    ));

    let removed = engine
        .uncomplete(&"pushups".into(), Some(&logged.id))
        .unwrap();
    assert_eq!(removed.value, 12.0);
    assert_eq!(engine.ledger(&"pushups".into()).unwrap().daily_progress, 0.0);
    assert!(events
        .borrow()
        .iter()
        .any(|e| e.event_type() == "CompletionRemoved"));
}

#[test]
fn unit_habits_require_a_count() {
    let (mut engine, _, _) = setup();
    engine
        .upsert_habit(HabitConfig::counted("pushups", "Push-ups", habitrack_core::Unit::Reps, 20.0))
        .unwrap();
    assert!(matches!(
        engine.log_manual(&"pushups".into(), ManualLog::default()),
        Err(CoreError::Validation(_))
    ));
}

#[test]
fn removing_a_habit_drops_its_timers() {
    let (mut engine, _, _) = setup();
    engine
        .upsert_habit(HabitConfig::timer("read", "Read", 10.0))
        .unwrap();
    engine.start_timer(&"read".into(), 0).unwrap();
    engine.remove_habit(&"read".into()).unwrap();
    assert!(engine.foreground().is_none());
    assert!(matches!(
        engine.timer_status(&"read".into(), 0),
        Err(CoreError::HabitNotFound(_))
    ));
}
