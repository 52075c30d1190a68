//! Orchestrated saga specs
//!
//! One persisted state machine per workflow drives the steps in sequence.

use std::sync::Arc;
use std::time::Duration;

use keel_adapters::{FakeProvisionAdapter, StepBehavior};
use keel_core::{
    Envelope, Event, EventBus, EventReceiver, Step, SystemClock, TraceId, WorkflowId,
    WorkflowState,
};
use keel_engine::{Dispatcher, EventHandler, Orchestrator, ProvisionStepHandler, RetryPolicy};
use keel_storage::{WalWorkflowStore, WorkflowStore};

struct Harness {
    dispatcher: Dispatcher,
    audit: EventReceiver,
    store: Arc<WalWorkflowStore>,
    provision: FakeProvisionAdapter,
}

fn harness(store: Arc<WalWorkflowStore>) -> Harness {
    let bus = Arc::new(EventBus::new());
    let audit = bus.set_global_handler();
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
        Arc::new(Orchestrator::new(Arc::clone(&store), SystemClock)) as Arc<dyn EventHandler>,
        step(Step::Tasks),
        step(Step::Notifications),
    ];
    let dispatcher = Dispatcher::new(bus, handlers, RetryPolicy::default());
    dispatcher.start();
    Harness {
        dispatcher,
        audit,
        store,
        provision,
    }
}

fn start(dispatcher: &Dispatcher, id: &str, trace: &str) {
    dispatcher.publish(Envelope::new(
        Event::WorkflowStarted {
            correlation_id: WorkflowId::new(id),
            name: "apollo".to_string(),
            description: "moon".to_string(),
            owner_id: "owner-1".to_string(),
        },
        TraceId::new(trace),
        &SystemClock,
    ));
}

fn drain(audit: &mut EventReceiver) -> Vec<Envelope> {
    let mut out = Vec::new();
    while let Ok(envelope) = audit.try_recv() {
        out.push(envelope);
    }
    out
}

#[tokio::test]
async fn steps_run_in_sequence_to_completion() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));

    start(&h.dispatcher, "proj-1", "trace-1");
    h.dispatcher.wait_idle().await;

    let names: Vec<_> = drain(&mut h.audit).iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "workflow:started",
            "tasks:requested",
            "tasks:outcome",
            "notifications:requested",
            "notifications:outcome",
            "workflow:completed",
        ]
    );

    let workflow = h.store.load(&WorkflowId::new("proj-1")).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Completed);
    assert!(workflow.completed_at.is_some());
}

#[tokio::test]
async fn trace_id_flows_through_every_event() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));

    start(&h.dispatcher, "proj-1", "trace-xyz");
    h.dispatcher.wait_idle().await;

    let envelopes = drain(&mut h.audit);
    assert!(!envelopes.is_empty());
    assert!(envelopes.iter().all(|e| e.trace_id.as_str() == "trace-xyz"));
}

#[tokio::test]
async fn failed_tasks_skip_notifications() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));
    h.provision.set_behavior(Step::Tasks, StepBehavior::Fail(503));

    start(&h.dispatcher, "proj-1", "trace-1");
    h.dispatcher.wait_idle().await;

    let envelopes = drain(&mut h.audit);
    assert_eq!(envelopes.last().unwrap().name(), "workflow:failed");
    assert_eq!(h.provision.calls_for(Step::Notifications), 0);

    let workflow = h.store.load(&WorkflowId::new("proj-1")).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Failed);
    assert_eq!(workflow.tasks_succeeded, Some(false));
}

#[tokio::test]
async fn slow_step_times_out_as_failure() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));
    h.provision
        .set_behavior(Step::Notifications, StepBehavior::Delay(Duration::from_secs(5)));

    start(&h.dispatcher, "proj-1", "trace-1");
    h.dispatcher.wait_idle().await;

    let envelopes = drain(&mut h.audit);
    assert!(matches!(
        &envelopes.last().unwrap().event,
        Event::WorkflowFailed { reason, .. } if reason == "notifications failed"
    ));
}

#[tokio::test]
async fn redelivered_start_yields_one_terminal_event() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));

    start(&h.dispatcher, "proj-1", "trace-1");
    start(&h.dispatcher, "proj-1", "trace-1");
    h.dispatcher.wait_idle().await;

    let terminal = drain(&mut h.audit)
        .iter()
        .filter(|e| e.event.is_terminal())
        .count();
    assert_eq!(terminal, 1);
    assert_eq!(h.provision.calls_for(Step::Tasks), 1);
}

#[tokio::test]
async fn independent_workflows_do_not_interfere() {
    let mut h = harness(Arc::new(WalWorkflowStore::ephemeral()));

    for i in 0..10 {
        start(&h.dispatcher, &format!("proj-{i}"), &format!("trace-{i}"));
    }
    h.dispatcher.wait_idle().await;

    let completed = drain(&mut h.audit)
        .iter()
        .filter(|e| e.name() == "workflow:completed")
        .count();
    assert_eq!(completed, 10);
    assert_eq!(h.store.list().await.unwrap().len(), 10);
}

#[tokio::test]
async fn instances_survive_reopening_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let wal = dir.path().join("workflows.wal");

    {
        let h = harness(Arc::new(WalWorkflowStore::open(&wal).unwrap()));
        start(&h.dispatcher, "proj-1", "trace-1");
        h.dispatcher.wait_idle().await;
    }

    let reopened = WalWorkflowStore::open(&wal).unwrap();
    let workflow = reopened.load(&WorkflowId::new("proj-1")).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Completed);
    assert_eq!(workflow.version, 3);
}
