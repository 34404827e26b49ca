//! Config command E2E tests.

mod common;

use common::{assert_contains, run_cli_failure, run_cli_json, run_cli_success};

#[test]
fn test_config_get_default() {
    let dir = tempfile::tempdir().unwrap();
    let value = run_cli_success(dir.path(), &["config", "get", "timer.complete_on_finish"]);
    assert_eq!(value.trim(), "true");
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    run_cli_success(dir.path(), &["config", "set", "timer.complete_on_finish", "false"]);
    let value = run_cli_success(dir.path(), &["config", "get", "timer.complete_on_finish"]);
    assert_eq!(value.trim(), "false");

    run_cli_success(dir.path(), &["config", "reset"]);
    let value = run_cli_success(dir.path(), &["config", "get", "timer.complete_on_finish"]);
    assert_eq!(value.trim(), "true");
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let stderr = run_cli_failure(dir.path(), &["config", "set", "timer.nonexistent", "1"]);
    assert_contains(&stderr, "Unknown configuration key");
    let stderr = run_cli_failure(dir.path(), &["config", "get", "nope"]);
    assert_contains(&stderr, "Unknown configuration key: nope");
}

#[test]
fn test_config_list() {
    let dir = tempfile::tempdir().unwrap();
    let entries = run_cli_json(dir.path(), &["config", "list"]);
    assert_eq!(entries["scheduler.max_capsules"], "12");
    assert_eq!(entries["plateau.trial_missed_day"], "hold");
}

#[test]
fn test_elapsed_credit_mode_from_config() {
    let dir = tempfile::tempdir().unwrap();
    run_cli_success(dir.path(), &["config", "set", "timer.complete_on_finish", "false"]);
    run_cli_success(dir.path(), &["habit", "add", "read", "--goal", "30"]);
    run_cli_success(dir.path(), &["timer", "start", "read", "--capsule", "0"]);
    let result = run_cli_json(dir.path(), &["timer", "finish", "read", "--capsule", "0"]);
    assert_eq!(result["timer"]["phase"], "finished");
    // Only a few seconds elapsed: no full credit.
    let credited = result["completion"]["value"].as_f64().unwrap_or(0.0);
    assert!(credited < 1.0, "credited {credited}");
}
