// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{DirectoryError, ProjectDirectory};
use async_trait::async_trait;
use keel_core::{TraceId, WorkflowId};

/// Directory that reports every project as existing
///
/// Used when no project service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpProjectDirectory;

impl NoOpProjectDirectory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProjectDirectory for NoOpProjectDirectory {
    async fn exists(&self, _id: &WorkflowId, _trace_id: &TraceId) -> Result<bool, DirectoryError> {
        Ok(true)
    }
}
