// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrated coordination: one persisted state machine per workflow

use crate::{EventHandler, RuntimeError};
use async_trait::async_trait;
use keel_core::{Clock, Effect, Envelope, EventPattern, Workflow, WorkflowId};
use keel_storage::WorkflowStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Applies events to the persisted [`Workflow`] for their correlation id
///
/// Events for one workflow are applied one at a time; the store's version check catches
/// a concurrent writer in another process.
pub struct Orchestrator<W, C> {
    workflows: Arc<W>,
    clock: C,
    locks: Mutex<HashMap<WorkflowId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<W: WorkflowStore, C: Clock> Orchestrator<W, C> {
    pub fn new(workflows: Arc<W>, clock: C) -> Self {
        Self {
            workflows,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: &WorkflowId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    /// Drop the entry for `id` unless another delivery is waiting on it
    fn release_lock(&self, id: &WorkflowId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference held by the map, one by the caller
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn apply(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        let id = envelope.correlation_id();
        let now = self.clock.utc_now();

        let current = match self.workflows.load(id).await? {
            Some(workflow) => workflow,
            None => match Workflow::from_start(&envelope.event, now) {
                Some(workflow) => {
                    self.workflows.create(&workflow).await?;
                    tracing::info!(correlation_id = %id, name = %workflow.name, "workflow created");
                    workflow
                }
                None => {
                    tracing::debug!(correlation_id = %id, event = envelope.name(), "no workflow, ignoring");
                    return Ok(Vec::new());
                }
            },
        };

        let (next, effects) = current.transition(&envelope.event, now);
        if next.version == current.version {
            tracing::debug!(
                correlation_id = %id,
                state = %current.state,
                event = envelope.name(),
                "event does not apply, ignoring"
            );
            return Ok(Vec::new());
        }

        self.workflows.save(&next, current.version).await?;
        tracing::info!(
            correlation_id = %id,
            from = %current.state,
            to = %next.state,
            "transitioned"
        );

        Ok(effects
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Publish(event) => Some(envelope.follow_up(event, &self.clock)),
                Effect::ForgetJoin { .. } => None,
            })
            .collect())
    }
}

#[async_trait]
impl<W: WorkflowStore, C: Clock> EventHandler for Orchestrator<W, C> {
    fn name(&self) -> &'static str {
        "orchestrator"
    }

    fn patterns(&self) -> Vec<EventPattern> {
        vec![
            EventPattern::new("workflow:started"),
            EventPattern::new("workflow:failed"),
            EventPattern::new("*:outcome"),
        ]
    }

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        let id = envelope.correlation_id();
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            self.apply(envelope).await
        };
        self.release_lock(id, lock);
        result
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
