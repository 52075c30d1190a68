// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for routing envelopes to subscribers
//!
//! Delivery is at-least-once from the subscriber's point of view: the same envelope may be
//! published again by a retrying producer, and handlers must tolerate that.

use super::routing::Route;
use crate::event::Envelope;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Sender for envelope delivery
pub type EventSender = mpsc::UnboundedSender<Envelope>;
/// Receiver for envelope delivery
pub type EventReceiver = mpsc::UnboundedReceiver<Envelope>;

/// The event bus routes envelopes to matching subscribers
pub struct EventBus {
    /// Keyed by handler name; subscribing again replaces the earlier route
    routes: Arc<RwLock<HashMap<&'static str, (Route, EventSender)>>>,
    /// Optional handler for all envelopes (audit log)
    global_handler: Arc<RwLock<Option<EventSender>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            global_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Deliver envelopes whose event name matches the route to the returned receiver
    pub fn subscribe(&self, route: Route) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.insert(route.handler, (route, tx));
        rx
    }

    /// Set a global handler that receives every envelope
    pub fn set_global_handler(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handler = self
            .global_handler
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *handler = Some(tx);
        rx
    }

    /// Publish an envelope to all matching subscribers, returning how many received it
    pub fn publish(&self, envelope: Envelope) -> usize {
        let event_name = envelope.name();

        if let Some(tx) = self
            .global_handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            let _ = tx.send(envelope.clone());
        }

        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        for (route, tx) in routes.values() {
            if route.matches(event_name) && tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            }
        }

        tracing::debug!(
            event = event_name,
            correlation_id = %envelope.correlation_id(),
            trace_id = %envelope.trace_id,
            delivered,
            "published"
        );
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            global_handler: Arc::clone(&self.global_handler),
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
