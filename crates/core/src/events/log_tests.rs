// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::context::TraceId;
use crate::event::Event;
use tempfile::TempDir;

fn make_test_log() -> (EventLog, TempDir) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.log");
    let log = EventLog::open(path).unwrap();
    (log, tmp)
}

fn envelope(event: Event) -> Envelope {
    Envelope::new(event, TraceId::new("t-1"), &FakeClock::new())
}

fn outcome(id: &str, success: bool) -> Envelope {
    envelope(Event::TasksOutcome {
        correlation_id: WorkflowId::new(id),
        success,
    })
}

#[test]
fn append_and_read_events() {
    let (mut log, _tmp) = make_test_log();

    log.append(outcome("p-1", true)).unwrap();
    log.append(envelope(Event::WorkflowCompleted {
        correlation_id: WorkflowId::new("p-1"),
    }))
    .unwrap();

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sequence, 1);
    assert_eq!(records[1].sequence, 2);
    assert_eq!(records[0].name, "tasks:outcome");
    assert_eq!(records[1].name, "workflow:completed");
    assert_eq!(records[1].envelope.trace_id.as_str(), "t-1");
}

#[test]
fn records_filter_by_workflow() {
    let (mut log, _tmp) = make_test_log();

    log.append(outcome("p-1", true)).unwrap();
    log.append(outcome("p-2", false)).unwrap();
    log.append(envelope(Event::WorkflowFailed {
        correlation_id: WorkflowId::new("p-2"),
        reason: "tasks failed".to_string(),
    }))
    .unwrap();

    let p2 = log.for_workflow(&WorkflowId::new("p-2")).unwrap();
    assert_eq!(p2.len(), 2);
    assert!(p2.iter().all(|r| r.envelope.correlation_id().as_str() == "p-2"));
}

#[test]
fn persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("events.log");

    {
        let mut log = EventLog::open(path.clone()).unwrap();
        log.append(outcome("p-1", true)).unwrap();
        log.append(outcome("p-2", true)).unwrap();
    }

    let mut log = EventLog::open(path).unwrap();
    assert_eq!(log.append(outcome("p-3", true)).unwrap().sequence, 3);
    assert_eq!(log.read_all().unwrap().len(), 3);
}
