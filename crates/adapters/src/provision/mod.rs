// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provisioning steps run against the task and notification services

mod http;
mod noop;

pub use http::HttpProvisionAdapter;
pub use noop::NoOpProvisionAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProvisionAdapter, ProvisionCall, StepBehavior};

use async_trait::async_trait;
use keel_core::{Step, TraceId, WorkflowId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{step} service request failed: {message}")]
    Request { step: Step, message: String },
    #[error("{step} service returned status {status}")]
    Status { step: Step, status: u16 },
    #[error("{0} service is not configured")]
    NotConfigured(Step),
}

/// Body sent to a step's project-setup endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub project_id: WorkflowId,
    pub project_name: String,
    pub owner_id: String,
}

/// Adapter for the external services behind each provisioning step
#[async_trait]
pub trait ProvisionAdapter: Clone + Send + Sync + 'static {
    async fn provision(
        &self,
        step: Step,
        request: &ProvisionRequest,
        trace_id: &TraceId,
    ) -> Result<(), ProvisionError>;
}
