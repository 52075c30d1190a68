//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status lifecycle.

use crate::prelude::*;

#[test]
fn daemon_status_when_not_running() {
    let temp = Sandbox::empty();

    temp.keel()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_start_reports_success() {
    let temp = Sandbox::empty();

    temp.keel()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
}

#[test]
fn daemon_start_is_idempotent() {
    let temp = Sandbox::empty();
    temp.keel().args(&["daemon", "start"]).passes();

    temp.keel()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("already running");
}

#[test]
fn daemon_status_shows_details_after_start() {
    let temp = Sandbox::empty();
    temp.keel().args(&["daemon", "start"]).passes();

    temp.keel()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon running")
        .stdout_has("Uptime:")
        .stdout_has("Style: orchestration")
        .stdout_has("Active workflows: 0");
}

#[test]
fn daemon_status_json_reports_style() {
    let temp = Sandbox::choreography();
    temp.keel().args(&["daemon", "start"]).passes();

    let run = temp.keel().args(&["-o", "json", "daemon", "status"]).passes();
    let json = run.json();
    assert_eq!(json["running"], true);
    assert_eq!(json["style"], "choreography");
}

#[test]
fn daemon_stop_then_status_reports_not_running() {
    let temp = Sandbox::empty();
    temp.keel().args(&["daemon", "start"]).passes();
    temp.keel()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");

    temp.keel()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_creates_state_files() {
    let temp = Sandbox::empty();
    temp.keel().args(&["daemon", "start"]).passes();

    let state = temp.state_path();
    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        state.join("daemon.pid").exists()
            && state.join("daemon.version").exists()
            && state.join("daemon.log").exists()
            && temp.socket_path().exists()
    }));
}

#[test]
fn daemon_start_error_log_shows_in_cli() {
    let temp = Sandbox::with_config("[store]\nbackend = \"redis\"\nurl = \"redis://127.0.0.1:1\"\n");

    // Redis is either compiled out or unreachable; both fail startup
    temp.keel()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("Failed to start daemon")
        .stderr_lacks("Connection timeout");
}
