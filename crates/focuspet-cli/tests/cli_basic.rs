//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focuspet"))
        .env("FOCUSPET_HOME", home)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn create_task(home: &Path) -> String {
    let task = run_json(home, &["task", "create", "Write report", "--duration", "60", "--interval", "12"]);
    task["id"].as_str().unwrap().to_string()
}

#[test]
fn test_task_create() {
    let home = tempfile::tempdir().unwrap();
    let task = run_json(home.path(), &["task", "create", "Write report"]);
    assert!(task["id"].as_str().unwrap().starts_with("task-"));
    assert_eq!(task["duration_secs"], 3600);
    assert_eq!(task["check_in_interval_secs"], 720);
    assert_eq!(task["active"], false);
}

#[test]
fn test_task_create_rejects_zero_interval() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["task", "create", "Bad", "--interval", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_task_list() {
    let home = tempfile::tempdir().unwrap();
    let id = create_task(home.path());
    let tasks = run_json(home.path(), &["task", "list"]);
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
}

#[test]
fn test_task_start_and_cancel() {
    let home = tempfile::tempdir().unwrap();
    let id = create_task(home.path());

    let status = run_json(home.path(), &["task", "start", &id]);
    assert_eq!(status["phase"], "running");
    assert_eq!(status["task"]["id"], id.as_str());
    assert_eq!(status["task"]["expected_check_ins"], 5);

    let (_, stderr, code) = run_cli(home.path(), &["task", "start", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("already active"));

    let status = run_json(home.path(), &["task", "cancel"]);
    assert_eq!(status["phase"], "idle");
    assert_eq!(status["pet"]["health"], 70);
}

#[test]
fn test_check_in_without_task_fails() {
    let home = tempfile::tempdir().unwrap();
    let evidence = home.path().join("photo.jpg");
    std::fs::write(&evidence, b"jpeg bytes").unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["task", "check-in", "--evidence", evidence.to_str().unwrap()],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("No active task"));
}

#[test]
fn test_check_in_before_window_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let id = create_task(home.path());
    run_json(home.path(), &["task", "start", &id]);

    let evidence = home.path().join("photo.jpg");
    std::fs::write(&evidence, b"jpeg bytes").unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["task", "check-in", "--evidence", evidence.to_str().unwrap()],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("next window opens at"));

    let status = run_json(home.path(), &["task", "status"]);
    assert_eq!(status["phase"], "running");
    assert_eq!(status["task"]["verified_check_ins"], 0);
}

#[test]
fn test_task_create_rejects_out_of_range_duration() {
    let home = tempfile::tempdir().unwrap();
    for duration in ["1000000000000", "9000000000000000"] {
        let (_, stderr, code) =
            run_cli(home.path(), &["task", "create", "Long", "--duration", duration]);
        assert_eq!(code, 1, "duration {duration} accepted");
        assert!(stderr.contains("duration"));
    }
    let tasks = run_json(home.path(), &["task", "list"]);
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn test_pet_list_has_initial_companion() {
    let home = tempfile::tempdir().unwrap();
    let pets = run_json(home.path(), &["pet", "list"]);
    let pets = pets.as_array().unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0]["name"], "Buddy");
    assert_eq!(pets[0]["current"], true);
}

#[test]
fn test_pet_add_free_type_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["pet", "add", "Tom", "--type", "cat"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("only available as the first companion"));

    let pet = run_json(home.path(), &["pet", "add", "Ember", "--type", "dragon"]);
    assert_eq!(pet["pet_type"], "dragon");
    assert_eq!(pet["level"], 1);
}

#[test]
fn test_badges() {
    let home = tempfile::tempdir().unwrap();
    let all = run_json(home.path(), &["badges"]);
    assert_eq!(all.as_array().unwrap().len(), 27);
    let unlocked = run_json(home.path(), &["badges", "--unlocked"]);
    assert!(unlocked.as_array().unwrap().is_empty());
}

#[test]
fn test_streak() {
    let home = tempfile::tempdir().unwrap();
    let streak = run_json(home.path(), &["streak"]);
    assert_eq!(streak["current"], 0);
    assert_eq!(streak["multiplier"], 1.0);
}

#[test]
fn test_alerts_follow_task() {
    let home = tempfile::tempdir().unwrap();
    let id = create_task(home.path());
    run_json(home.path(), &["task", "start", &id]);
    let alerts = run_json(home.path(), &["alerts"]);
    assert!(alerts
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a["kind"] == "completion"));

    run_json(home.path(), &["task", "cancel"]);
    let alerts = run_json(home.path(), &["alerts"]);
    assert!(alerts.as_array().unwrap().is_empty());
}

#[test]
fn test_config_get_and_set() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "verification.timeout_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "calendar.utc_offset_minutes", "540"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "calendar.utc_offset_minutes"]);
    assert_eq!(stdout.trim(), "540");

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "calendar.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown configuration key"));
}
