// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed counting semaphore over the coordination store
//!
//! Each holder owns one member of the semaphore's scored owner set. Admission is an atomic
//! insert-if-below-capacity; a held slot is kept alive by a heartbeat and reclaimed by
//! any party once it is older than the slot timeout.

use crate::SemaphoreError;
use keel_core::{Clock, OwnerId, SemaphoreConfig, SemaphoreKeys};
use keel_storage::CoordinationStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const RELEASED: &str = "released";
const RECLAIMED: &str = "reclaimed";

pub struct DistributedSemaphore<S: CoordinationStore, C: Clock> {
    config: SemaphoreConfig,
    keys: SemaphoreKeys,
    owner: OwnerId,
    store: Arc<S>,
    clock: C,
    held: bool,
    heartbeat: Option<JoinHandle<()>>,
    lease_lost: Arc<AtomicBool>,
}

impl<S: CoordinationStore, C: Clock> DistributedSemaphore<S, C> {
    pub fn new(
        config: SemaphoreConfig,
        owner: OwnerId,
        store: Arc<S>,
        clock: C,
    ) -> Result<Self, SemaphoreError> {
        config.validate()?;
        Ok(Self {
            keys: config.keys(),
            config,
            owner,
            store,
            clock,
            held: false,
            heartbeat: None,
            lease_lost: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn config(&self) -> &SemaphoreConfig {
        &self.config
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// True once a heartbeat found this holder's slot reclaimed
    pub fn lease_lost(&self) -> bool {
        self.lease_lost.load(Ordering::SeqCst)
    }

    /// Try to take a slot, waiting at most `timeout`
    ///
    /// Returns `Ok(false)` when capacity stayed exhausted for the whole wait. Nothing is
    /// left behind in the store on that path.
    pub async fn acquire(&mut self, timeout: Duration) -> Result<bool, SemaphoreError> {
        if self.held {
            return Err(SemaphoreError::AlreadyHeld(self.config.name.clone()));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        // Subscribe before the first attempt so a release between attempt and wait is seen
        let mut released = self.store.subscribe(&self.keys.released).await?;

        loop {
            if self.try_acquire().await? {
                self.held = true;
                self.lease_lost.store(false, Ordering::SeqCst);
                self.start_heartbeat();
                tracing::info!(semaphore = %self.config.name, owner = %self.owner, "acquired");
                return Ok(true);
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                tracing::info!(
                    semaphore = %self.config.name,
                    owner = %self.owner,
                    timeout_ms = timeout.as_millis() as u64,
                    "acquire timed out"
                );
                return Ok(false);
            }

            let wait = self.config.poll_interval.min(deadline - now);
            tokio::select! {
                message = released.recv() => {
                    if message.is_none() {
                        tokio::time::sleep(wait).await;
                    }
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Give the slot back and wake waiters
    pub async fn release(&mut self) -> Result<(), SemaphoreError> {
        if !self.held {
            return Err(SemaphoreError::NotHeld(self.config.name.clone()));
        }
        // Stay held until the store confirms removal
        let removed = self
            .store
            .remove(&self.keys.owners, self.owner.as_str())
            .await?;
        self.stop_heartbeat();
        self.held = false;
        if !removed {
            tracing::warn!(semaphore = %self.config.name, owner = %self.owner, "slot was already reclaimed");
        }
        self.store.publish(&self.keys.released, RELEASED).await?;
        tracing::info!(semaphore = %self.config.name, owner = %self.owner, "released");
        Ok(())
    }

    /// Number of live slots after sweeping expired ones
    pub async fn current_count(&self) -> Result<usize, SemaphoreError> {
        self.sweep().await?;
        Ok(self.store.count(&self.keys.owners).await?)
    }

    pub async fn is_available(&self) -> Result<bool, SemaphoreError> {
        Ok(self.current_count().await? < self.config.max_count as usize)
    }

    async fn sweep(&self) -> Result<usize, SemaphoreError> {
        let cutoff = self.config.stale_cutoff(self.clock.epoch_millis());
        let reclaimed = self.store.remove_expired(&self.keys.owners, cutoff).await?;
        if reclaimed > 0 {
            tracing::info!(semaphore = %self.config.name, reclaimed, "reclaimed expired slots");
            self.store.publish(&self.keys.released, RECLAIMED).await?;
        }
        Ok(reclaimed)
    }

    async fn try_acquire(&self) -> Result<bool, SemaphoreError> {
        self.sweep().await?;
        Ok(self
            .store
            .insert_if_below(
                &self.keys.owners,
                self.owner.as_str(),
                self.clock.epoch_millis(),
                self.config.max_count,
                self.config.key_ttl(),
            )
            .await?)
    }

    fn start_heartbeat(&mut self) {
        let store = Arc::clone(&self.store);
        let clock = self.clock.clone();
        let owners = self.keys.owners.clone();
        let owner = self.owner.clone();
        let name = self.config.name.clone();
        let interval = self.config.heartbeat_interval;
        let ttl = self.config.key_ttl();
        let lease_lost = Arc::clone(&self.lease_lost);

        self.heartbeat = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match store
                    .touch(&owners, owner.as_str(), clock.epoch_millis(), ttl)
                    .await
                {
                    Ok(true) => tracing::trace!(semaphore = %name, owner = %owner, "heartbeat"),
                    Ok(false) => {
                        tracing::warn!(semaphore = %name, owner = %owner, "lease lost, slot was reclaimed");
                        lease_lost.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => tracing::warn!(semaphore = %name, error = %e, "heartbeat failed"),
                }
            }
        }));
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

impl<S: CoordinationStore, C: Clock> Drop for DistributedSemaphore<S, C> {
    fn drop(&mut self) {
        self.stop_heartbeat();
        if !self.held {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(semaphore = %self.config.name, owner = %self.owner, "dropped while held, slot will expire");
            return;
        };
        let store = Arc::clone(&self.store);
        let keys = self.keys.clone();
        let owner = self.owner.clone();
        runtime.spawn(async move {
            if let Err(e) = store.remove(&keys.owners, owner.as_str()).await {
                tracing::warn!(owner = %owner, error = %e, "background release failed");
                return;
            }
            if let Err(e) = store.publish(&keys.released, RELEASED).await {
                tracing::warn!(owner = %owner, error = %e, "release notification failed");
            }
        });
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
