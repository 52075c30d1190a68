// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use crate::RuntimeError;
use keel_core::{Clock, Effect, Envelope, TracedEffect};
use keel_storage::{saga_outcomes_key, CoordinationStore};
use std::sync::Arc;
use tracing::Instrument;

/// Executes effects requested by the state machines
///
/// Publish effects become follow-up envelopes that keep the trace id of the envelope
/// being handled; the caller puts them on the transport.
pub struct Executor<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S: CoordinationStore, C: Clock> Executor<S, C> {
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Execute a single effect with tracing
    pub async fn execute(
        &self,
        effect: Effect,
        origin: &Envelope,
    ) -> Result<Option<Envelope>, RuntimeError> {
        let span = tracing::info_span!("effect", effect = effect.name());
        async {
            tracing::debug!(fields = ?effect.fields(), "executing");

            let start = std::time::Instant::now();
            let result = self.execute_inner(effect, origin).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(envelope) => tracing::debug!(
                    elapsed_ms,
                    publishes = envelope.is_some(),
                    "completed"
                ),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(
        &self,
        effect: Effect,
        origin: &Envelope,
    ) -> Result<Option<Envelope>, RuntimeError> {
        match effect {
            Effect::Publish(event) => Ok(Some(origin.follow_up(event, &self.clock))),
            Effect::ForgetJoin { correlation_id } => {
                self.store
                    .delete(&saga_outcomes_key(correlation_id.as_str()))
                    .await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
