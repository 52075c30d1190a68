// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared coordination store: scored owner sets, join records, claims and channels
//!
//! Every operation is atomic with respect to other callers of the same store. The
//! semaphore uses the scored-set operations; the choreography finalizer uses
//! `record_field`, `claim` and `delete`.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryCoordinationStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisCoordinationStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
    #[error("coordination store error: {0}")]
    Backend(String),
    #[error("unexpected reply from coordination store: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Connection-level failures that a later attempt may not see
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Messages published on one channel after `subscribe` returned
pub struct ChannelSubscription {
    rx: mpsc::UnboundedReceiver<String>,
    forwarder: Option<JoinHandle<()>>,
}

impl ChannelSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            rx,
            forwarder: None,
        }
    }

    /// Subscription fed by a background task that is aborted when this is dropped
    pub fn with_forwarder(rx: mpsc::UnboundedReceiver<String>, forwarder: JoinHandle<()>) -> Self {
        Self {
            rx,
            forwarder: Some(forwarder),
        }
    }

    /// Next message, or `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Atomic primitives the semaphore and the finalizer are built on
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Remove members of the scored set scored at or below `cutoff`; returns how many
    async fn remove_expired(&self, key: &str, cutoff: u64) -> Result<usize, StoreError>;

    /// Add `member` with `score` only while the set holds fewer than `limit` members
    ///
    /// On success the key's expiry is reset to `ttl`. A member already present is
    /// refreshed and counts as success.
    async fn insert_if_below(
        &self,
        key: &str,
        member: &str,
        score: u64,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Refresh the score of a member that is still present; never re-adds
    async fn touch(
        &self,
        key: &str,
        member: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn count(&self, key: &str) -> Result<usize, StoreError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError>;

    /// Set one field of a hash and return every field, in one atomic step
    async fn record_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<HashMap<String, String>, StoreError>;

    /// Set-if-absent; true for exactly one caller until the key expires or is deleted
    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Join-state keys for one workflow
pub fn saga_outcomes_key(correlation_id: &str) -> String {
    format!("saga:{correlation_id}:outcomes")
}

pub fn saga_terminal_key(correlation_id: &str) -> String {
    format!("saga:{correlation_id}:terminal")
}
