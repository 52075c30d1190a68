// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step handlers: call one downstream service and report the outcome

use crate::{EventHandler, RuntimeError};
use async_trait::async_trait;
use keel_adapters::{ProvisionAdapter, ProvisionRequest};
use keel_core::{Clock, Envelope, Event, EventPattern, Step};
use std::time::Duration;

/// Reacts to a step's request event by provisioning it and publishing its outcome
///
/// An outcome is always published: service errors and timeouts report `success = false`.
pub struct ProvisionStepHandler<P, C> {
    step: Step,
    adapter: P,
    timeout: Duration,
    clock: C,
}

impl<P: ProvisionAdapter, C: Clock> ProvisionStepHandler<P, C> {
    pub fn new(step: Step, adapter: P, timeout: Duration, clock: C) -> Self {
        Self {
            step,
            adapter,
            timeout,
            clock,
        }
    }

    fn request(&self, event: &Event) -> Option<ProvisionRequest> {
        match (self.step, event) {
            (
                Step::Tasks,
                Event::CreateTasksRequested {
                    correlation_id,
                    name,
                    owner_id,
                },
            )
            | (
                Step::Notifications,
                Event::SetupNotificationsRequested {
                    correlation_id,
                    name,
                    owner_id,
                },
            ) => Some(ProvisionRequest {
                project_id: correlation_id.clone(),
                project_name: name.clone(),
                owner_id: owner_id.clone(),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl<P: ProvisionAdapter, C: Clock> EventHandler for ProvisionStepHandler<P, C> {
    fn name(&self) -> &'static str {
        match self.step {
            Step::Tasks => "tasks-step",
            Step::Notifications => "notifications-step",
        }
    }

    fn patterns(&self) -> Vec<EventPattern> {
        vec![EventPattern::new(&format!("{}:requested", self.step))]
    }

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        let Some(request) = self.request(&envelope.event) else {
            return Ok(Vec::new());
        };

        let call = self
            .adapter
            .provision(self.step, &request, &envelope.trace_id);
        let success = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(step = %self.step, correlation_id = %request.project_id, error = %e, "step failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    step = %self.step,
                    correlation_id = %request.project_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "step timed out"
                );
                false
            }
        };

        let outcome = Event::step_outcome(self.step, request.project_id, success);
        Ok(vec![envelope.follow_up(outcome, &self.clock)])
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
