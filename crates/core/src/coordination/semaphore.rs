// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore configuration and key layout
//!
//! A semaphore is a named set of owner entries in the shared store, each scored by the
//! time it was taken or last refreshed. Entries older than the slot timeout are stale and
//! are swept before every admission attempt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SLOT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace added to the slot timeout for the owner-set key expiry
pub const KEY_TTL_GRACE: Duration = Duration::from_secs(60);

/// Semaphore configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Name identifying this semaphore across processes
    pub name: String,
    /// Maximum number of concurrent holders
    pub max_count: u32,
    /// How long a slot survives without a heartbeat
    #[serde(with = "humantime_serde", default = "default_slot_timeout")]
    pub slot_timeout: Duration,
    /// Default bound for `acquire`
    #[serde(with = "humantime_serde", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,
    /// Fallback re-check period while waiting for a release notification
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

fn default_slot_timeout() -> Duration {
    DEFAULT_SLOT_TIMEOUT
}

fn default_acquire_timeout() -> Duration {
    DEFAULT_ACQUIRE_TIMEOUT
}

fn default_heartbeat_interval() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemaphoreConfigError {
    #[error("semaphore name must not be empty")]
    EmptyName,
    #[error("semaphore {0}: max_count must be at least 1")]
    ZeroCapacity(String),
    #[error("semaphore {name}: heartbeat interval {heartbeat:?} must be shorter than slot timeout {slot_timeout:?}")]
    HeartbeatTooSlow {
        name: String,
        heartbeat: Duration,
        slot_timeout: Duration,
    },
    #[error("semaphore {0}: poll interval must be non-zero")]
    ZeroPollInterval(String),
}

impl SemaphoreConfig {
    pub fn new(name: impl Into<String>, max_count: u32) -> Self {
        Self {
            name: name.into(),
            max_count,
            slot_timeout: DEFAULT_SLOT_TIMEOUT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Expiry applied to the owner-set key whenever it is written
    pub fn key_ttl(&self) -> Duration {
        self.slot_timeout + KEY_TTL_GRACE
    }

    /// Oldest score (epoch millis) that is still a live slot at `now_ms`
    pub fn stale_cutoff(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.slot_timeout.as_millis() as u64)
    }

    pub fn keys(&self) -> SemaphoreKeys {
        SemaphoreKeys::for_name(&self.name)
    }

    pub fn validate(&self) -> Result<(), SemaphoreConfigError> {
        if self.name.trim().is_empty() {
            return Err(SemaphoreConfigError::EmptyName);
        }
        if self.max_count == 0 {
            return Err(SemaphoreConfigError::ZeroCapacity(self.name.clone()));
        }
        if self.heartbeat_interval >= self.slot_timeout {
            return Err(SemaphoreConfigError::HeartbeatTooSlow {
                name: self.name.clone(),
                heartbeat: self.heartbeat_interval,
                slot_timeout: self.slot_timeout,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(SemaphoreConfigError::ZeroPollInterval(self.name.clone()));
        }
        Ok(())
    }
}

/// Shared-store keys for one named semaphore
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SemaphoreKeys {
    /// Scored set of current owners
    pub owners: String,
    /// Release notification channel
    pub released: String,
}

impl SemaphoreKeys {
    pub fn for_name(name: &str) -> Self {
        Self {
            owners: format!("semaphore:{name}:owners"),
            released: format!("semaphore:{name}:released"),
        }
    }
}

/// Identity of one semaphore holder instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
