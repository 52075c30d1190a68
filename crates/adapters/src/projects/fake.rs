// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake project directory for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DirectoryError, ProjectDirectory};
use async_trait::async_trait;
use keel_core::{TraceId, WorkflowId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Recorded lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCall {
    pub id: WorkflowId,
    pub trace_id: TraceId,
}

#[derive(Default)]
struct FakeDirectoryState {
    known: HashSet<WorkflowId>,
    failure: Option<String>,
    calls: Vec<DirectoryCall>,
}

/// Fake project directory for testing
#[derive(Clone, Default)]
pub struct FakeProjectDirectory {
    inner: Arc<Mutex<FakeDirectoryState>>,
}

impl FakeProjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.known.insert(WorkflowId::new(id));
    }

    /// Make every lookup fail with a request error
    pub fn set_failure(&self, message: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failure = message.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }
}

#[async_trait]
impl ProjectDirectory for FakeProjectDirectory {
    async fn exists(&self, id: &WorkflowId, trace_id: &TraceId) -> Result<bool, DirectoryError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.calls.push(DirectoryCall {
            id: id.clone(),
            trace_id: trace_id.clone(),
        });
        if let Some(message) = &inner.failure {
            return Err(DirectoryError::Request(message.clone()));
        }
        Ok(inner.known.contains(id))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
