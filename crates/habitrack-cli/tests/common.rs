//! Shared helpers for CLI E2E tests.
//!
//! Each test owns a temporary data directory so config and database state
//! never leak between tests or into the user's home.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

/// Run the CLI against `data_dir` and return (stdout, stderr, exit code).
pub fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_habitrack"))
        .args(args)
        .env("HABITRACK_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run a CLI command that should succeed, returning stdout.
pub fn run_cli_success(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(
        code, 0,
        "Command {:?} failed with exit code {}\nstderr: {}",
        args, code, stderr
    );
    stdout
}

/// Run a CLI command that should fail, returning stderr.
pub fn run_cli_failure(data_dir: &Path, args: &[&str]) -> String {
    let (_stdout, stderr, code) = run_cli(data_dir, args);
    assert_ne!(code, 0, "Command {:?} should have failed but succeeded", args);
    stderr
}

/// Run a CLI command that should succeed and parse its stdout as JSON.
pub fn run_cli_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let stdout = run_cli_success(data_dir, args);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Failed to parse JSON from {:?}: {}\n{}", args, e, stdout))
}

/// Assert that text contains a substring.
pub fn assert_contains(text: &str, substring: &str) {
    assert!(
        text.contains(substring),
        "Expected text to contain '{}', but got:\n{}",
        substring,
        text
    );
}
