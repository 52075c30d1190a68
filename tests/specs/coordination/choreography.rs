//! Choreographed saga specs
//!
//! Independent handlers react to events; a finalizer joins the step outcomes.

use std::sync::Arc;
use std::time::Duration;

use keel_adapters::{FakeProjectDirectory, FakeProvisionAdapter, StepBehavior};
use keel_core::{Envelope, Event, EventBus, EventReceiver, Step, SystemClock, TraceId, WorkflowId};
use keel_engine::{
    Dispatcher, EventHandler, Finalizer, ProvisionStepHandler, RetryPolicy, WorkflowStarter,
    REASON_PROJECT_NOT_FOUND,
};
use keel_storage::{saga_outcomes_key, saga_terminal_key, MemoryCoordinationStore};

struct Harness {
    dispatcher: Dispatcher,
    audit: EventReceiver,
    store: Arc<MemoryCoordinationStore>,
    directory: FakeProjectDirectory,
    provision: FakeProvisionAdapter,
}

fn harness() -> Harness {
    let bus = Arc::new(EventBus::new());
    let audit = bus.set_global_handler();
    let store = Arc::new(MemoryCoordinationStore::new());
    let directory = FakeProjectDirectory::new();
    let provision = FakeProvisionAdapter::new();

    let step = |step| {
        Arc::new(ProvisionStepHandler::new(
            step,
            provision.clone(),
            Duration::from_millis(200),
            SystemClock,
        )) as Arc<dyn EventHandler>
    };
    let handlers = vec![
        Arc::new(WorkflowStarter::new(directory.clone(), SystemClock)) as Arc<dyn EventHandler>,
        step(Step::Tasks),
        step(Step::Notifications),
        Arc::new(Finalizer::new(
            Arc::clone(&store),
            SystemClock,
            Duration::from_secs(3600),
        )) as Arc<dyn EventHandler>,
    ];
    let dispatcher = Dispatcher::new(bus, handlers, RetryPolicy::default());
    dispatcher.start();
    Harness {
        dispatcher,
        audit,
        store,
        directory,
        provision,
    }
}

fn start(dispatcher: &Dispatcher, id: &str) {
    dispatcher.publish(Envelope::new(
        Event::WorkflowStarted {
            correlation_id: WorkflowId::new(id),
            name: "apollo".to_string(),
            description: "moon".to_string(),
            owner_id: "owner-1".to_string(),
        },
        TraceId::new(format!("trace-{id}")),
        &SystemClock,
    ));
}

fn terminals(audit: &mut EventReceiver) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = audit.try_recv() {
        if envelope.event.is_terminal() {
            out.push(envelope);
        }
    }
    out
}

#[tokio::test]
async fn both_steps_succeed_and_workflow_completes() {
    let mut h = harness();
    h.directory.add_project("proj-1");

    start(&h.dispatcher, "proj-1");
    h.dispatcher.wait_idle().await;

    let terminal = terminals(&mut h.audit);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].name(), "workflow:completed");
    assert_eq!(terminal[0].trace_id.as_str(), "trace-proj-1");
    assert_eq!(h.provision.calls_for(Step::Tasks), 1);
    assert_eq!(h.provision.calls_for(Step::Notifications), 1);
}

#[tokio::test]
async fn join_state_is_cleared_but_terminal_flag_remains() {
    let mut h = harness();
    h.directory.add_project("proj-1");

    start(&h.dispatcher, "proj-1");
    h.dispatcher.wait_idle().await;
    assert_eq!(terminals(&mut h.audit).len(), 1);

    let id = WorkflowId::new("proj-1");
    assert!(!h.store.contains_key(&saga_outcomes_key(id.as_str())));
    assert!(h.store.contains_key(&saga_terminal_key(id.as_str())));
}

#[tokio::test]
async fn unknown_project_fails_without_running_steps() {
    let mut h = harness();

    start(&h.dispatcher, "ghost");
    h.dispatcher.wait_idle().await;

    let terminal = terminals(&mut h.audit);
    assert!(matches!(
        &terminal[..],
        [e] if matches!(&e.event, Event::WorkflowFailed { reason, .. } if reason == REASON_PROJECT_NOT_FOUND)
    ));
    assert!(h.provision.calls().is_empty());
}

#[tokio::test]
async fn one_failed_step_fails_with_both_outcomes_named() {
    let mut h = harness();
    h.directory.add_project("proj-1");
    h.provision.set_behavior(Step::Notifications, StepBehavior::Fail(500));

    start(&h.dispatcher, "proj-1");
    h.dispatcher.wait_idle().await;

    let terminal = terminals(&mut h.audit);
    assert_eq!(terminal.len(), 1);
    assert!(matches!(
        &terminal[0].event,
        Event::WorkflowFailed { reason, .. } if reason == "tasks: true, notifications: false"
    ));
    // No compensation: the successful step is not undone
    assert_eq!(h.provision.calls_for(Step::Tasks), 1);
}

#[tokio::test]
async fn redelivered_outcomes_produce_one_terminal_event() {
    let mut h = harness();
    h.directory.add_project("proj-1");

    start(&h.dispatcher, "proj-1");
    h.dispatcher.wait_idle().await;

    let id = WorkflowId::new("proj-1");
    for step in [Step::Tasks, Step::Notifications, Step::Tasks] {
        h.dispatcher.publish(Envelope::new(
            Event::step_outcome(step, id.clone(), true),
            TraceId::new("trace-proj-1"),
            &SystemClock,
        ));
    }
    h.dispatcher.wait_idle().await;

    assert_eq!(terminals(&mut h.audit).len(), 1);
}

#[tokio::test]
async fn many_workflows_complete_independently() {
    let mut h = harness();
    for i in 0..20 {
        h.directory.add_project(format!("proj-{i}"));
    }

    for i in 0..20 {
        start(&h.dispatcher, &format!("proj-{i}"));
    }
    h.dispatcher.wait_idle().await;

    let mut completed: Vec<String> = terminals(&mut h.audit)
        .iter()
        .filter(|e| e.name() == "workflow:completed")
        .map(|e| e.event.correlation_id().to_string())
        .collect();
    completed.sort();
    completed.dedup();
    assert_eq!(completed.len(), 20);
}
