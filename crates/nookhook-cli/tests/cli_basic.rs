//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run, each against its own isolated
//! home directory so parallel tests never share state.

use std::path::Path;
use std::process::Command;

fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "nookhook-cli", "--quiet", "--"])
        .args(args)
        .env("HOME", home)
        .env("NOOKHOOK_ENV", "dev")
        .output()
        .expect("failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn timer_status_without_session_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "status"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error"), "stderr was: {stderr}");
}

#[test]
fn timer_start_then_status() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(
        home.path(),
        &["timer", "start", "write tests", "--minutes", "25"],
    );
    assert_eq!(code, 0);
    let event: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(event["type"], "session_started");
    assert_eq!(event["duration_seconds"], 1500);

    let (stdout, _, code) = run_cli(home.path(), &["timer", "status"]);
    assert_eq!(code, 0);
    let snapshot: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(snapshot["type"], "state_snapshot");
    assert_eq!(snapshot["state"], "running");
}

#[test]
fn second_timer_start_conflicts() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["timer", "start", "first"]);
    assert_eq!(code, 0);
    let (_, stderr, code) = run_cli(home.path(), &["timer", "start", "second"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("active session"), "stderr was: {stderr}");
}

#[test]
fn book_log_settles_points() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(
        home.path(),
        &["book", "add", "dune", "Dune", "--pages", "412"],
    );
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(home.path(), &["book", "log", "dune", "30"]);
    assert_eq!(code, 0);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["base_points"], 3);

    let (stdout, _, code) = run_cli(home.path(), &["rewards", "balance"]);
    assert_eq!(code, 0);
    let balance: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(balance["total_points"].as_i64().unwrap() > 0);
}

#[test]
fn stats_for_fresh_user() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["stats"]);
    assert_eq!(code, 0);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_points"], 0);
    assert_eq!(stats["level"], 1);
}

#[test]
fn config_show_and_path() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("quote_reward"));

    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
}
