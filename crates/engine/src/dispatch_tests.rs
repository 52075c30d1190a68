// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::RuntimeError;
use async_trait::async_trait;
use keel_core::{Event, EventPattern, FakeClock, TraceId, WorkflowId};
use keel_storage::StoreError;
use std::sync::Mutex;

/// Records deliveries, failing the first `failures` of them
struct Recorder {
    name: &'static str,
    pattern: &'static str,
    failures: Mutex<usize>,
    transient: bool,
    seen: Mutex<Vec<Envelope>>,
    reply: Option<fn(&Envelope) -> Event>,
}

impl Recorder {
    fn new(name: &'static str, pattern: &'static str) -> Self {
        Self {
            name,
            pattern,
            failures: Mutex::new(0),
            transient: true,
            seen: Mutex::new(Vec::new()),
            reply: None,
        }
    }

    fn failing(mut self, failures: usize, transient: bool) -> Self {
        self.failures = Mutex::new(failures);
        self.transient = transient;
        self
    }

    fn replying(mut self, reply: fn(&Envelope) -> Event) -> Self {
        self.reply = Some(reply);
        self
    }

    fn seen(&self) -> Vec<Envelope> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn patterns(&self) -> Vec<EventPattern> {
        vec![EventPattern::new(self.pattern)]
    }

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        self.seen.lock().unwrap().push(envelope.clone());
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                let error = if self.transient {
                    StoreError::Unavailable("down".to_string())
                } else {
                    StoreError::Backend("bad script".to_string())
                };
                return Err(error.into());
            }
        }
        Ok(self
            .reply
            .map(|reply| vec![envelope.follow_up(reply(envelope), &FakeClock::new())])
            .unwrap_or_default())
    }
}

fn started() -> Envelope {
    Envelope::new(
        Event::WorkflowStarted {
            correlation_id: WorkflowId::new("proj-1"),
            name: "apollo".to_string(),
            description: String::new(),
            owner_id: "owner-1".to_string(),
        },
        TraceId::new("trace-d"),
        &FakeClock::new(),
    )
}

fn tasks_done(envelope: &Envelope) -> Event {
    Event::TasksOutcome {
        correlation_id: envelope.correlation_id().clone(),
        success: true,
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        min_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
    }
}

fn dispatcher(handlers: Vec<Arc<dyn EventHandler>>) -> Dispatcher {
    let dispatcher = Dispatcher::new(Arc::new(EventBus::new()), handlers, policy());
    dispatcher.start();
    dispatcher
}

#[tokio::test]
async fn follow_ups_reach_the_next_handler_with_the_same_trace() {
    let starter = Arc::new(Recorder::new("starter", "workflow:started").replying(tasks_done));
    let finalizer = Arc::new(Recorder::new("finalizer", "*:outcome"));
    let dispatcher = dispatcher(vec![
        starter.clone() as Arc<dyn EventHandler>,
        finalizer.clone() as Arc<dyn EventHandler>,
    ]);

    assert_eq!(dispatcher.publish(started()), 1);
    dispatcher.wait_idle().await;

    let seen = finalizer.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name(), "tasks:outcome");
    assert_eq!(seen[0].trace_id.as_str(), "trace-d");
    assert_eq!(dispatcher.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_redelivered() {
    let flaky = Arc::new(Recorder::new("flaky", "workflow:started").failing(2, true));
    let dispatcher = dispatcher(vec![flaky.clone() as Arc<dyn EventHandler>]);

    dispatcher.publish(started());
    dispatcher.wait_idle().await;

    assert_eq!(flaky.seen().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn redelivery_is_bounded() {
    let down = Arc::new(Recorder::new("down", "workflow:started").failing(10, true));
    let dispatcher = dispatcher(vec![down.clone() as Arc<dyn EventHandler>]);

    dispatcher.publish(started());
    dispatcher.wait_idle().await;

    assert_eq!(down.seen().len(), policy().max_attempts);
}

#[tokio::test]
async fn permanent_failures_are_not_redelivered() {
    let broken = Arc::new(Recorder::new("broken", "workflow:started").failing(1, false));
    let dispatcher = dispatcher(vec![broken.clone() as Arc<dyn EventHandler>]);

    dispatcher.publish(started());
    dispatcher.wait_idle().await;

    assert_eq!(broken.seen().len(), 1);
}

#[tokio::test]
async fn unmatched_envelopes_leave_nothing_pending() {
    let finalizer = Arc::new(Recorder::new("finalizer", "*:outcome"));
    let dispatcher = dispatcher(vec![finalizer.clone() as Arc<dyn EventHandler>]);

    assert_eq!(dispatcher.publish(started()), 0);
    dispatcher.wait_idle().await;
    assert!(finalizer.seen().is_empty());
    assert_eq!(dispatcher.handler_names(), vec!["finalizer"]);
}
