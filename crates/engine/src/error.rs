// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the coordination engine

use keel_core::SemaphoreConfigError;
use keel_storage::{StoreError, WorkflowStoreError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while a handler processes a delivered event
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("coordination store: {0}")]
    Store(#[from] StoreError),
    #[error("workflow store: {0}")]
    Workflows(#[from] WorkflowStoreError),
}

impl RuntimeError {
    /// Whether redelivering the same event may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RuntimeError::Store(e) => e.is_transient(),
            RuntimeError::Workflows(WorkflowStoreError::VersionConflict { .. }) => true,
            RuntimeError::Workflows(_) => false,
        }
    }
}

/// Errors from semaphore use
#[derive(Debug, Error)]
pub enum SemaphoreError {
    #[error("semaphore {0} is already held by this instance")]
    AlreadyHeld(String),
    #[error("semaphore {0} is not held by this instance")]
    NotHeld(String),
    #[error("could not acquire semaphore {name} within {timeout:?}")]
    AcquireTimeout { name: String, timeout: Duration },
    #[error("coordination store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    InvalidConfig(#[from] SemaphoreConfigError),
}

impl SemaphoreError {
    /// Capacity was exhausted for the whole wait; the caller should back off
    pub fn is_admission_rejection(&self) -> bool {
        matches!(self, SemaphoreError::AcquireTimeout { .. })
    }
}
