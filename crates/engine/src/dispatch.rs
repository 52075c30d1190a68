// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivers bus envelopes to event handlers
//!
//! Each handler gets its own bus subscription; each delivered envelope runs as its own task,
//! so a slow step never blocks other deliveries. Transient handler errors are retried with
//! exponential backoff, which stands in for transport redelivery.

use crate::EventHandler;
use backon::{BackoffBuilder, ExponentialBuilder};
use keel_core::{Envelope, EventBus, Route};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Bounded redelivery of a failed handler invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total deliveries including the first
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before each attempt; the first attempt runs immediately
    fn delays(&self) -> impl Iterator<Item = Duration> {
        std::iter::once(Duration::ZERO).chain(
            ExponentialBuilder::default()
                .with_min_delay(self.min_delay)
                .with_max_delay(self.max_delay)
                .with_max_times(self.max_attempts.saturating_sub(1))
                .with_jitter()
                .build(),
        )
    }
}

struct Inner {
    bus: Arc<EventBus>,
    handlers: Vec<Arc<dyn EventHandler>>,
    retry: RetryPolicy,
    /// Deliveries published but not yet finished
    pending: AtomicUsize,
    idle: Notify,
}

/// Routes envelopes to the handlers whose patterns match their routing name
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(bus: Arc<EventBus>, handlers: Vec<Arc<dyn EventHandler>>, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                bus,
                handlers,
                retry,
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.inner.handlers.iter().map(|h| h.name()).collect()
    }

    /// Subscribe every handler and start delivering
    ///
    /// Envelopes published before `start` reach no handler.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.inner
            .handlers
            .iter()
            .map(|handler| {
                let route = Route::new(handler.name(), handler.patterns());
                for pattern in route.patterns.iter().filter(|p| !p.is_valid()) {
                    tracing::warn!(handler = handler.name(), %pattern, "pattern can never match");
                }
                let mut rx = self.inner.bus.subscribe(route);
                let dispatcher = self.clone();
                let handler = Arc::clone(handler);
                tokio::spawn(async move {
                    while let Some(envelope) = rx.recv().await {
                        let dispatcher = dispatcher.clone();
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move { dispatcher.deliver(handler, envelope).await });
                    }
                })
            })
            .collect()
    }

    /// Publish on the bus and count the deliveries as pending
    pub fn publish(&self, envelope: Envelope) -> usize {
        let expected = self
            .inner
            .handlers
            .iter()
            .filter(|h| h.accepts(envelope.name()))
            .count();
        self.inner.pending.fetch_add(expected, Ordering::SeqCst);

        let delivered = self.inner.bus.publish(envelope);
        if delivered < expected {
            self.finish(expected - delivered);
        }
        delivered
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until every published envelope, and everything it caused, has been handled
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn deliver(&self, handler: Arc<dyn EventHandler>, envelope: Envelope) {
        let span = tracing::info_span!(
            "handle",
            handler = handler.name(),
            event = envelope.name(),
            correlation_id = %envelope.correlation_id(),
            trace_id = %envelope.trace_id,
        );
        self.deliver_with_retry(handler.as_ref(), &envelope)
            .instrument(span)
            .await;
        self.finish(1);
    }

    async fn deliver_with_retry(&self, handler: &dyn EventHandler, envelope: &Envelope) {
        let max_attempts = self.inner.retry.max_attempts.max(1);
        for (attempt, delay) in self.inner.retry.delays().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match handler.handle(envelope).await {
                Ok(follow_ups) => {
                    tracing::debug!(attempt, follow_ups = follow_ups.len(), "handled");
                    for follow_up in follow_ups {
                        self.publish(follow_up);
                    }
                    return;
                }
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    tracing::warn!(attempt, error = %e, "handler failed, redelivering");
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "handler failed, dropping envelope");
                    return;
                }
            }
        }
    }

    fn finish(&self, count: usize) {
        let before = self.inner.pending.fetch_sub(count, Ordering::SeqCst);
        if before <= count {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
