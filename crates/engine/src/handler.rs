// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event handler seam used by the dispatcher

use crate::RuntimeError;
use async_trait::async_trait;
use keel_core::{Envelope, EventPattern};

/// A reactive component subscribed to a set of event names
///
/// `handle` may run concurrently for different envelopes and may see the same envelope
/// more than once; it returns the envelopes to publish in response.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn patterns(&self) -> Vec<EventPattern>;

    async fn handle(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RuntimeError>;

    fn accepts(&self, event_name: &str) -> bool {
        self.patterns().iter().any(|p| p.matches(event_name))
    }
}
