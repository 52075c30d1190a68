// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ProvisionAdapter, ProvisionError, ProvisionRequest};
use async_trait::async_trait;
use keel_core::{Step, TraceId};

/// Provisioning adapter that succeeds without calling anything
///
/// Used when no downstream services are configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpProvisionAdapter;

impl NoOpProvisionAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvisionAdapter for NoOpProvisionAdapter {
    async fn provision(
        &self,
        _step: Step,
        _request: &ProvisionRequest,
        _trace_id: &TraceId,
    ) -> Result<(), ProvisionError> {
        Ok(())
    }
}
