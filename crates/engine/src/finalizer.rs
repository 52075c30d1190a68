// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Choreography finalizer: joins the two step outcomes into one terminal event
//!
//! The join-state lives in the coordination store, so any number of finalizer instances
//! may see the outcomes. Recording an outcome returns every field in the same atomic
//! step; whoever then wins the terminal claim emits the verdict.

use crate::executor::Executor;
use crate::{EventHandler, RuntimeError};
use async_trait::async_trait;
use keel_core::{Clock, Envelope, EventPattern, OutcomeJoin};
use keel_storage::{saga_outcomes_key, saga_terminal_key, CoordinationStore};
use std::sync::Arc;
use std::time::Duration;

pub struct Finalizer<S, C> {
    store: Arc<S>,
    executor: Executor<S, C>,
    join_ttl: Duration,
}

impl<S: CoordinationStore, C: Clock> Finalizer<S, C> {
    /// `join_ttl` bounds how long partial join-state and the terminal claim survive
    ///
    /// It must exceed the transport's redelivery window. Once the terminal claim expires,
    /// both outcomes redelivered again would build a fresh join and emit a second verdict.
    pub fn new(store: Arc<S>, clock: C, join_ttl: Duration) -> Self {
        Self {
            executor: Executor::new(Arc::clone(&store), clock),
            store,
            join_ttl,
        }
    }
}

#[async_trait]
impl<S: CoordinationStore, C: Clock> EventHandler for Finalizer<S, C> {
    fn name(&self) -> &'static str {
        "finalizer"
    }

    fn patterns(&self) -> Vec<EventPattern> {
        vec![
            EventPattern::new("tasks:outcome"),
            EventPattern::new("notifications:outcome"),
        ]
    }

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError> {
        let Some((step, success)) = envelope.event.as_outcome() else {
            return Ok(Vec::new());
        };
        let id = envelope.correlation_id();

        let fields = self
            .store
            .record_field(
                &saga_outcomes_key(id.as_str()),
                OutcomeJoin::field_name(step),
                OutcomeJoin::field_value(success),
                self.join_ttl,
            )
            .await?;
        let join = OutcomeJoin::from_fields(&fields);
        if !join.is_complete() {
            tracing::debug!(correlation_id = %id, %step, success, "outcome recorded, waiting");
            return Ok(Vec::new());
        }

        if !self
            .store
            .claim(&saga_terminal_key(id.as_str()), self.join_ttl)
            .await?
        {
            tracing::debug!(correlation_id = %id, "already finalized");
            return Ok(Vec::new());
        }

        tracing::info!(
            correlation_id = %id,
            tasks = ?join.tasks,
            notifications = ?join.notifications,
            "finalizing"
        );
        // The claim is taken: publishing must not be lost to a failed cleanup
        let mut published = Vec::new();
        for effect in join.finalize(id) {
            match self.executor.execute(effect, envelope).await {
                Ok(Some(out)) => published.push(out),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    correlation_id = %id,
                    error = %e,
                    "join cleanup failed, state expires with its ttl"
                ),
            }
        }
        Ok(published)
    }
}

#[cfg(test)]
#[path = "finalizer_tests.rs"]
mod tests;
