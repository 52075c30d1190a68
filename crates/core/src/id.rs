// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions

use std::sync::Arc;

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// Semaphore owner ids: `<host>:<uuid>`, unique per holder instance
///
/// The host prefix makes a stuck slot traceable to the machine that took it.
#[derive(Clone)]
pub struct OwnerIdGen {
    host: Arc<str>,
}

impl OwnerIdGen {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Arc::from(host.into()),
        }
    }

    /// Use the `HOSTNAME` environment variable, falling back to `localhost`
    pub fn from_env() -> Self {
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(host)
    }
}

impl IdGen for OwnerIdGen {
    fn next(&self) -> String {
        format!("{}:{}", self.host, uuid::Uuid::new_v4())
    }
}
