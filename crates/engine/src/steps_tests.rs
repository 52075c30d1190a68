// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use keel_adapters::{FakeProvisionAdapter, StepBehavior};
use keel_core::{FakeClock, TraceId, WorkflowId};
use yare::parameterized;

fn requested(step: Step) -> Envelope {
    Envelope::new(
        Event::step_requested(
            step,
            WorkflowId::new("proj-1"),
            "apollo".to_string(),
            "owner-1".to_string(),
        ),
        TraceId::new("trace-s"),
        &FakeClock::new(),
    )
}

fn handler(
    step: Step,
    adapter: &FakeProvisionAdapter,
) -> ProvisionStepHandler<FakeProvisionAdapter, FakeClock> {
    ProvisionStepHandler::new(step, adapter.clone(), Duration::from_secs(5), FakeClock::new())
}

#[parameterized(
    tasks = { Step::Tasks },
    notifications = { Step::Notifications },
)]
#[test_macro(tokio::test)]
async fn success_reports_success(step: Step) {
    let adapter = FakeProvisionAdapter::new();
    let out = handler(step, &adapter).handle(&requested(step)).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event.as_outcome(), Some((step, true)));
    assert_eq!(out[0].trace_id.as_str(), "trace-s");

    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.project_name, "apollo");
    assert_eq!(calls[0].trace_id.as_str(), "trace-s");
}

#[tokio::test]
async fn service_error_reports_failure() {
    let adapter = FakeProvisionAdapter::new();
    adapter.set_behavior(Step::Notifications, StepBehavior::Fail(503));

    let out = handler(Step::Notifications, &adapter)
        .handle(&requested(Step::Notifications))
        .await
        .unwrap();
    assert_eq!(out[0].event.as_outcome(), Some((Step::Notifications, false)));
}

#[tokio::test(start_paused = true)]
async fn slow_service_times_out_as_failure() {
    let adapter = FakeProvisionAdapter::new();
    adapter.set_behavior(Step::Tasks, StepBehavior::Delay(Duration::from_secs(60)));

    let out = handler(Step::Tasks, &adapter)
        .handle(&requested(Step::Tasks))
        .await
        .unwrap();
    assert_eq!(out[0].event.as_outcome(), Some((Step::Tasks, false)));
}

#[tokio::test]
async fn other_step_requests_are_ignored() {
    let adapter = FakeProvisionAdapter::new();
    let out = handler(Step::Tasks, &adapter)
        .handle(&requested(Step::Notifications))
        .await
        .unwrap();

    assert!(out.is_empty());
    assert!(adapter.calls().is_empty());
}

#[test]
fn handler_names_and_patterns_follow_step() {
    let adapter = FakeProvisionAdapter::new();
    let tasks = handler(Step::Tasks, &adapter);
    assert_eq!(tasks.name(), "tasks-step");
    assert!(tasks.accepts("tasks:requested"));
    assert!(!tasks.accepts("notifications:requested"));
    assert_eq!(handler(Step::Notifications, &adapter).name(), "notifications-step");
}
