//! Workflow specs
//!
//! Start workflows through the CLI and watch them reach a terminal state. With no
//! service URLs configured the daemon uses no-op adapters, so every step succeeds.

use crate::prelude::*;

#[test]
fn orchestrated_workflow_completes() {
    let temp = Sandbox::empty();

    temp.keel()
        .args(&[
            "workflow", "start", "apollo", "--owner", "owner-1", "--project-id", "proj-42",
            "--wait", "5",
        ])
        .passes()
        .stdout_has("Workflow: proj-42")
        .stdout_has("State: completed")
        .stdout_has("workflow:completed");
}

#[test]
fn choreographed_workflow_completes() {
    let temp = Sandbox::choreography();

    temp.keel()
        .args(&["workflow", "start", "apollo", "--project-id", "proj-7", "--wait", "5"])
        .passes()
        .stdout_has("State: completed")
        .stdout_has("tasks:outcome")
        .stdout_has("notifications:outcome");
}

#[test]
fn start_without_wait_prints_ids() {
    let temp = Sandbox::empty();

    let run = temp
        .keel()
        .args(&["-o", "json", "workflow", "start", "apollo"])
        .passes();
    let json = run.json();
    assert!(!json["id"].as_str().unwrap().is_empty());
    assert!(!json["trace_id"].as_str().unwrap().is_empty());
}

#[test]
fn list_shows_started_workflows() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["workflow", "list"])
        .passes()
        .stdout_has("No workflows");

    temp.keel()
        .args(&["workflow", "start", "apollo", "--project-id", "proj-1", "--wait", "5"])
        .passes();
    temp.keel()
        .args(&["workflow", "start", "gemini", "--project-id", "proj-2", "--wait", "5"])
        .passes();

    temp.keel()
        .args(&["workflow", "list"])
        .passes()
        .stdout_has("proj-1")
        .stdout_has("gemini")
        .stdout_lacks("No workflows");
}

#[test]
fn show_accepts_unique_prefix() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["workflow", "start", "apollo", "--project-id", "alpha-123", "--wait", "5"])
        .passes();

    temp.keel()
        .args(&["workflow", "show", "alpha"])
        .passes()
        .stdout_has("Workflow: alpha-123");
}

#[test]
fn every_event_carries_the_start_trace() {
    let temp = Sandbox::choreography();
    let run = temp
        .keel()
        .args(&["-o", "json", "workflow", "start", "apollo", "--project-id", "p-1", "--wait", "5"])
        .passes();
    let json = run.json();

    let events = json["events"].as_array().unwrap();
    assert!(events.len() >= 4);
    let trace = events[0]["trace_id"].as_str().unwrap();
    assert!(events.iter().all(|e| e["trace_id"] == trace));
}

#[test]
fn workflows_survive_daemon_restart() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["workflow", "start", "apollo", "--project-id", "keep-1", "--wait", "5"])
        .passes();
    temp.keel().args(&["daemon", "stop"]).passes();

    temp.keel()
        .args(&["workflow", "show", "keep-1"])
        .passes()
        .stdout_has("State: completed")
        .stdout_has("Version: 3");
}
