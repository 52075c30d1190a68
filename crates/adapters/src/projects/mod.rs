// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project directory: does a project exist before provisioning starts

mod http;
mod noop;

pub use http::HttpProjectDirectory;
pub use noop::NoOpProjectDirectory;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{DirectoryCall, FakeProjectDirectory};

use async_trait::async_trait;
use keel_core::{TraceId, WorkflowId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("project lookup request failed: {0}")]
    Request(String),
    #[error("project service returned status {0}")]
    Status(u16),
}

/// Read-only view of the project service
#[async_trait]
pub trait ProjectDirectory: Clone + Send + Sync + 'static {
    async fn exists(&self, id: &WorkflowId, trace_id: &TraceId) -> Result<bool, DirectoryError>;
}
