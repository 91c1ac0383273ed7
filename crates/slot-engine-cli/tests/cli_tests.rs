//! Integration tests for the `slots` CLI binary.
//!
//! These drive the real binary through `assert_cmd`, feeding JSON fixtures via
//! `-i` or stdin and checking the JSON written to stdout or `-o`.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn slots() -> Command {
    Command::cargo_bin("slots").unwrap()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command should run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// group
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn group_file_to_stdout() {
    let groups = stdout_json(slots().args(["group", "-i", &fixture("day.json")]));

    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["slots"].as_array().unwrap().len(), 2);
    assert_eq!(groups[1]["slots"].as_array().unwrap().len(), 1);
}

#[test]
fn group_stdin() {
    let input = std::fs::read_to_string(fixture("day.json")).unwrap();
    slots()
        .arg("group")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("5b1e8f0a-3c2d-4a6b-9e7f-101010101003"));
}

#[test]
fn group_file_to_file() {
    let output_path = std::env::temp_dir().join("slots-test-group-output.json");
    let _ = std::fs::remove_file(&output_path);

    slots()
        .args(["group", "-i", &fixture("day.json"), "-o"])
        .arg(&output_path)
        .assert()
        .success();

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let groups: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(groups.as_array().unwrap().len(), 2);

    let _ = std::fs::remove_file(&output_path);
}

#[test]
fn invalid_json_fails() {
    slots()
        .arg("group")
        .write_stdin("not json [[[")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse slot JSON"));
}

#[test]
fn missing_file_fails() {
    slots()
        .args(["group", "-i", "/nonexistent/slots.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// validate
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn validate_reports_rejections() {
    slots()
        .args([
            "validate",
            "-i",
            &fixture("candidates.json"),
            "--existing",
            &fixture("day.json"),
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("7c2f9a1b-4d3e-4b7c-8f80-202020202001"))
        .stdout(predicate::str::contains("45"))
        .stderr(predicate::str::contains("2 of 3 candidates rejected"));
}

#[test]
fn validate_accepts_clean_candidates() {
    slots()
        .args(["validate", "-i", &fixture("day.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid: 3 slots"));
}

#[test]
fn config_narrows_allowed_durations() {
    let half_hour = r#"[{
        "id": "1f4b2c3d-6e5f-4d9e-b1a2-404040404001",
        "trainerId": "t1",
        "startTime": "2025-05-05T09:00:00Z",
        "endTime": "2025-05-05T09:30:00Z",
        "date": "2025-05-05",
        "status": "open",
        "ownerTimeZone": "UTC"
    }]"#;

    slots()
        .arg("validate")
        .write_stdin(half_hour)
        .assert()
        .success();

    slots()
        .args(["--config", &fixture("strict.toml"), "validate"])
        .write_stdin(half_hour)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 candidates rejected"));
}

#[test]
fn invalid_config_fails() {
    slots()
        .args(["--config", "/nonexistent/engine.toml", "group"])
        .write_stdin("[]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

// ─────────────────────────────────────────────────────────────────────────────
// expand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn expand_tuesdays_skips_blocked_date() {
    let expansion = stdout_json(slots().args([
        "expand",
        "-i",
        &fixture("tuesday.json"),
        "--existing",
        &fixture("blocked.json"),
        "--mode",
        "weekday",
        "--weekday",
        "tue",
        "--months",
        "3",
    ]));

    assert_eq!(expansion["slots"].as_array().unwrap().len(), 11);
    let skipped = expansion["skipped"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["date"], "2026-01-13");
    assert_eq!(skipped[0]["reason"], "overlap");
    assert_eq!(
        skipped[0]["conflicting"],
        "9d3a0b2c-5e4f-4c8d-a091-303030303002"
    );
}

#[test]
fn expand_next_week_keeps_local_time() {
    let expansion = stdout_json(slots().args([
        "expand",
        "-i",
        &fixture("tuesday.json"),
        "--mode",
        "next-week",
    ]));

    let slot = &expansion["slots"][0];
    assert_eq!(slot["date"], "2025-12-09");
    assert_eq!(slot["startTime"], "2025-12-09T14:00:00Z");
    assert_eq!(slot["status"], "open");
}

#[test]
fn expand_weekday_mode_requires_weekday() {
    slots()
        .args(["expand", "-i", &fixture("tuesday.json"), "--mode", "weekday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--weekday is required"));
}

#[test]
fn expand_rejects_unknown_weekday() {
    slots()
        .args([
            "expand",
            "-i",
            &fixture("tuesday.json"),
            "--mode",
            "current-month",
            "--weekday",
            "someday",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown weekday"));
}

// ─────────────────────────────────────────────────────────────────────────────
// range / show
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn range_splits_window_and_clips_last_slot() {
    let generated = stdout_json(slots().args([
        "range",
        "--trainer",
        "trainer-ny",
        "--date",
        "2025-03-11",
        "--from",
        "09:00",
        "--to",
        "11:30",
        "--zone",
        "America/New_York",
    ]));

    let generated = generated.as_array().unwrap();
    assert_eq!(generated.len(), 3);
    assert_eq!(generated[0]["startTime"], "2025-03-11T13:00:00Z");
    assert_eq!(generated[2]["endTime"], "2025-03-11T15:30:00Z");
}

#[test]
fn range_with_unknown_zone_warns() {
    slots()
        .args([
            "range", "--trainer", "t1", "--date", "2025-03-11", "--from", "09:00", "--to",
            "10:00", "--zone", "Mars/Base",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Mars/Base"));
}

#[test]
fn show_renders_in_viewer_zone() {
    let shown = stdout_json(slots().args([
        "show",
        "-i",
        &fixture("day.json"),
        "--zone",
        "Europe/London",
    ]));

    assert_eq!(shown[0]["localStart"], "13:00:00");
    assert_eq!(shown[0]["localEnd"], "14:00:00");
    assert_eq!(shown[0]["timeZone"], "Europe/London");
}

// ─────────────────────────────────────────────────────────────────────────────
// book / release
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn book_updates_snapshot() {
    let snapshot = stdout_json(slots().args([
        "book",
        "-i",
        &fixture("day.json"),
        "--slot",
        "5b1e8f0a-3c2d-4a6b-9e7f-101010101002",
        "--package",
        "pkg-1",
        "--client",
        "client-1",
        "--meeting",
        "zoom-1",
    ]));

    let booked = snapshot
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "5b1e8f0a-3c2d-4a6b-9e7f-101010101002")
        .unwrap();
    assert_eq!(booked["status"], "booked");
    assert_eq!(booked["packageId"], "pkg-1");
    assert_eq!(booked["meetingId"], "zoom-1");
}

#[test]
fn booking_booked_slot_fails() {
    slots()
        .args([
            "book",
            "-i",
            &fixture("blocked.json"),
            "--slot",
            "9d3a0b2c-5e4f-4c8d-a091-303030303002",
            "--package",
            "pkg-1",
            "--client",
            "client-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to book slot"))
        .stderr(predicate::str::contains("already booked"));
}

#[test]
fn release_clears_booking() {
    let snapshot = stdout_json(slots().args([
        "release",
        "-i",
        &fixture("blocked.json"),
        "--slot",
        "9d3a0b2c-5e4f-4c8d-a091-303030303002",
    ]));

    assert_eq!(snapshot[0]["status"], "released");
    assert_eq!(snapshot[0]["packageId"], Value::Null);
}

#[test]
fn invalid_slot_id_fails() {
    slots()
        .args(["release", "-i", &fixture("blocked.json"), "--slot", "not-a-uuid"])
        .assert()
        .failure();
}
