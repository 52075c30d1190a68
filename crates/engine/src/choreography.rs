// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Choreographed coordination: the starter fans out both step requests at once

use crate::{EventHandler, RuntimeError};
use async_trait::async_trait;
use keel_adapters::ProjectDirectory;
use keel_core::{Clock, Envelope, Event, EventPattern, Step};

pub const REASON_PROJECT_NOT_FOUND: &str = "project not found";

/// Checks the project exists, then requests both steps with no ordering between them
pub struct WorkflowStarter<D, C> {
    directory: D,
    clock: C,
}

impl<D: ProjectDirectory, C: Clock> WorkflowStarter<D, C> {
    pub fn new(directory: D, clock: C) -> Self {
        Self { directory, clock }
    }
}

#[async_trait]
impl<D: ProjectDirectory, C: Clock> EventHandler for WorkflowStarter<D, C> {
    fn name(&self) -> &'static str {
        "starter"
    }

    fn patterns(&self) -> Vec<EventPattern> {
        vec![EventPattern::new("workflow:started")]
    }

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        let Event::WorkflowStarted {
            correlation_id,
            name,
            owner_id,
            ..
        } = &envelope.event
        else {
            return Ok(Vec::new());
        };

        let events = match self
            .directory
            .exists(correlation_id, &envelope.trace_id)
            .await
        {
            Ok(true) => [Step::Tasks, Step::Notifications]
                .into_iter()
                .map(|step| {
                    Event::step_requested(
                        step,
                        correlation_id.clone(),
                        name.clone(),
                        owner_id.clone(),
                    )
                })
                .collect(),
            Ok(false) => vec![Event::WorkflowFailed {
                correlation_id: correlation_id.clone(),
                reason: REASON_PROJECT_NOT_FOUND.to_string(),
            }],
            Err(e) => vec![Event::WorkflowFailed {
                correlation_id: correlation_id.clone(),
                reason: format!("project lookup failed: {e}"),
            }],
        };

        Ok(events
            .into_iter()
            .map(|event| envelope.follow_up(event, &self.clock))
            .collect())
    }
}

#[cfg(test)]
#[path = "choreography_tests.rs"]
mod tests;
