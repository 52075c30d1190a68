// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore construction with shared defaults

use crate::semaphore::DistributedSemaphore;
use crate::SemaphoreError;
use keel_core::{Clock, IdGen, OwnerId, OwnerIdGen, SemaphoreConfig};
use keel_storage::CoordinationStore;
use std::sync::Arc;
use std::time::Duration;

/// Builds semaphores on one store, each with a fresh owner id from `I`
pub struct SemaphoreFactory<S, C, I = OwnerIdGen> {
    store: Arc<S>,
    clock: C,
    owner_ids: I,
    defaults: SemaphoreConfig,
}

impl<S: CoordinationStore, C: Clock, I: IdGen> SemaphoreFactory<S, C, I> {
    /// `defaults` supplies every timing; its name and capacity are ignored
    pub fn new(store: Arc<S>, clock: C, owner_ids: I, defaults: SemaphoreConfig) -> Self {
        Self {
            store,
            clock,
            owner_ids,
            defaults,
        }
    }

    pub fn config_for(&self, name: &str, max_count: u32) -> SemaphoreConfig {
        SemaphoreConfig {
            name: name.to_string(),
            max_count,
            ..self.defaults.clone()
        }
    }

    /// Construct without acquiring
    pub fn create(
        &self,
        name: &str,
        max_count: u32,
    ) -> Result<DistributedSemaphore<S, C>, SemaphoreError> {
        DistributedSemaphore::new(
            self.config_for(name, max_count),
            OwnerId::new(self.owner_ids.next()),
            Arc::clone(&self.store),
            self.clock.clone(),
        )
    }

    /// Construct and acquire, failing with `AcquireTimeout` when no slot frees up in time
    ///
    /// `timeout` falls back to the configured acquire timeout.
    pub async fn create_and_wait(
        &self,
        name: &str,
        max_count: u32,
        timeout: Option<Duration>,
    ) -> Result<DistributedSemaphore<S, C>, SemaphoreError> {
        let mut semaphore = self.create(name, max_count)?;
        let timeout = timeout.unwrap_or(semaphore.config().acquire_timeout);
        if semaphore.acquire(timeout).await? {
            Ok(semaphore)
        } else {
            Err(SemaphoreError::AcquireTimeout {
                name: name.to_string(),
                timeout,
            })
        }
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
