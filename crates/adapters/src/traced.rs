// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::projects::{DirectoryError, ProjectDirectory};
use crate::provision::{ProvisionAdapter, ProvisionError, ProvisionRequest};
use async_trait::async_trait;
use keel_core::{Step, TraceId, WorkflowId};
use tracing::Instrument;

/// Wrapper that adds tracing to any ProjectDirectory
#[derive(Clone)]
pub struct TracedProjectDirectory<D> {
    inner: D,
}

impl<D> TracedProjectDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: ProjectDirectory> ProjectDirectory for TracedProjectDirectory<D> {
    async fn exists(&self, id: &WorkflowId, trace_id: &TraceId) -> Result<bool, DirectoryError> {
        let span = tracing::info_span!("projects.exists", %id, %trace_id);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.exists(id, trace_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(found) => tracing::info!(found, elapsed_ms, "looked up"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "lookup failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any ProvisionAdapter
#[derive(Clone)]
pub struct TracedProvisionAdapter<P> {
    inner: P,
}

impl<P> TracedProvisionAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ProvisionAdapter> ProvisionAdapter for TracedProvisionAdapter<P> {
    async fn provision(
        &self,
        step: Step,
        request: &ProvisionRequest,
        trace_id: &TraceId,
    ) -> Result<(), ProvisionError> {
        let span = tracing::info_span!(
            "provision",
            %step,
            project_id = %request.project_id,
            %trace_id
        );
        async {
            tracing::info!(owner_id = %request.owner_id, "starting");

            let start = std::time::Instant::now();
            let result = self.inner.provision(step, request, trace_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "provisioned"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "provisioning failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
