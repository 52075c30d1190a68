// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordination store
//!
//! Shared by every clone; one mutex serializes all operations, which gives the same
//! atomicity the shared store provides with server-side scripts. Expiry is evaluated
//! lazily against the injected clock.

use super::{ChannelSubscription, CoordinationStore, StoreError};
use async_trait::async_trait;
use keel_core::{Clock, SlotSet, SystemClock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

struct Expiring<T> {
    value: T,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct MemoryState {
    sets: HashMap<String, Expiring<SlotSet>>,
    hashes: HashMap<String, Expiring<HashMap<String, String>>>,
    flags: HashMap<String, Expiring<()>>,
    channels: HashMap<String, Vec<mpsc::UnboundedSender<String>>>,
}

fn purge<T>(map: &mut HashMap<String, Expiring<T>>, key: &str, now: Instant) {
    if map
        .get(key)
        .and_then(|e| e.expires_at)
        .is_some_and(|at| at <= now)
    {
        map.remove(key);
    }
}

/// Coordination store kept in process memory
#[derive(Clone)]
pub struct MemoryCoordinationStore<C: Clock = SystemClock> {
    state: Arc<Mutex<MemoryState>>,
    available: Arc<AtomicBool>,
    clock: C,
}

impl MemoryCoordinationStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCoordinationStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCoordinationStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            available: Arc::new(AtomicBool::new(true)),
            clock,
        }
    }

    /// Simulate an outage: while unavailable every operation fails with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Members of a scored set with their scores, for inspection
    pub fn members(&self, key: &str) -> Vec<(String, u64)> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        state
            .sets
            .get(key)
            .map(|e| e.value.members().map(|(m, s)| (m.to_string(), s)).collect())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, now);
        purge(&mut state.hashes, key, now);
        purge(&mut state.flags, key, now);
        state.sets.contains_key(key) || state.hashes.contains_key(key) || state.flags.contains_key(key)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        }
    }

    fn expiry(&self, ttl: Duration) -> Option<Instant> {
        Some(self.clock.now() + ttl)
    }
}

#[async_trait]
impl<C: Clock> CoordinationStore for MemoryCoordinationStore<C> {
    async fn remove_expired(&self, key: &str, cutoff: u64) -> Result<usize, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        let Some(entry) = state.sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = entry.value.sweep_expired(cutoff).len();
        if entry.value.is_empty() {
            state.sets.remove(key);
        }
        Ok(removed)
    }

    async fn insert_if_below(
        &self,
        key: &str,
        member: &str,
        score: u64,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let expires_at = self.expiry(ttl);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        let entry = state.sets.entry(key.to_string()).or_insert_with(|| Expiring {
            value: SlotSet::new(),
            expires_at: None,
        });
        let inserted = entry.value.insert_if_below(member, score, limit as usize);
        if inserted {
            entry.expires_at = expires_at;
        } else if entry.value.is_empty() {
            state.sets.remove(key);
        }
        Ok(inserted)
    }

    async fn touch(
        &self,
        key: &str,
        member: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let expires_at = self.expiry(ttl);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        let Some(entry) = state.sets.get_mut(key) else {
            return Ok(false);
        };
        let touched = entry.value.touch(member, score);
        if touched {
            entry.expires_at = expires_at;
        }
        Ok(touched)
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        let Some(entry) = state.sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = entry.value.remove(member);
        if entry.value.is_empty() {
            state.sets.remove(key);
        }
        Ok(removed)
    }

    async fn count(&self, key: &str) -> Result<usize, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.sets, key, self.clock.now());
        Ok(state.sets.get(key).map(|e| e.value.len()).unwrap_or(0))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subscribers) = state.channels.get_mut(channel) {
            subscribers.retain(|tx| tx.send(message.to_string()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError> {
        self.check()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(ChannelSubscription::new(rx))
    }

    async fn record_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<HashMap<String, String>, StoreError> {
        self.check()?;
        let expires_at = self.expiry(ttl);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.hashes, key, self.clock.now());
        let entry = state.hashes.entry(key.to_string()).or_insert_with(|| Expiring {
            value: HashMap::new(),
            expires_at: None,
        });
        entry.value.insert(field.to_string(), value.to_string());
        entry.expires_at = expires_at;
        Ok(entry.value.clone())
    }

    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        let expires_at = self.expiry(ttl);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        purge(&mut state.flags, key, self.clock.now());
        if state.flags.contains_key(key) {
            return Ok(false);
        }
        state.flags.insert(
            key.to_string(),
            Expiring {
                value: (),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sets.remove(key);
        state.hashes.remove(key);
        state.flags.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
