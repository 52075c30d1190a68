// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store for orchestrated workflow instances

use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use async_trait::async_trait;
use keel_core::{Operation, Workflow, WorkflowId};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowStoreError {
    #[error("workflow {0} already exists")]
    AlreadyExists(WorkflowId),
    #[error("workflow {0} not found")]
    NotFound(WorkflowId),
    #[error("workflow {id}: expected version {expected}, found {found}")]
    VersionConflict {
        id: WorkflowId,
        expected: u64,
        found: u64,
    },
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Persistence for orchestrated instances, keyed by correlation id
#[async_trait]
pub trait WorkflowStore: Send + Sync + 'static {
    async fn load(&self, id: &WorkflowId) -> Result<Option<Workflow>, WorkflowStoreError>;

    /// Look up by exact id or unambiguous prefix
    async fn find(&self, id_or_prefix: &str) -> Result<Option<Workflow>, WorkflowStoreError>;

    async fn create(&self, workflow: &Workflow) -> Result<(), WorkflowStoreError>;

    /// Persist `workflow` if the stored copy is still at `expected_version`
    async fn save(&self, workflow: &Workflow, expected_version: u64)
        -> Result<(), WorkflowStoreError>;

    /// All instances, oldest first
    async fn list(&self) -> Result<Vec<Workflow>, WorkflowStoreError>;
}

struct Inner {
    state: MaterializedState,
    wal: Option<Wal>,
}

/// Workflow store backed by the write-ahead log
pub struct WalWorkflowStore {
    inner: Mutex<Inner>,
}

impl WalWorkflowStore {
    /// Open the WAL at `path`, replaying every recorded operation
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let mut state = MaterializedState::default();
        let ops = Wal::replay(path)?;
        let replayed = ops.len();
        for op in &ops {
            state.apply(op);
        }
        let wal = Wal::open(path)?;
        tracing::info!(
            path = %path.display(),
            operations = replayed,
            workflows = state.workflows.len(),
            "replayed workflow WAL"
        );
        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                wal: Some(wal),
            }),
        })
    }

    /// In-memory store with no durability
    pub fn ephemeral() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MaterializedState::default(),
                wal: None,
            }),
        }
    }

    fn commit(inner: &mut Inner, op: Operation) -> Result<(), WalError> {
        if let Some(wal) = inner.wal.as_mut() {
            wal.append(&op)?;
        }
        inner.state.apply(&op);
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for WalWorkflowStore {
    async fn load(&self, id: &WorkflowId) -> Result<Option<Workflow>, WorkflowStoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.state.workflows.get(id).cloned())
    }

    async fn find(&self, id_or_prefix: &str) -> Result<Option<Workflow>, WorkflowStoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.state.get_workflow(id_or_prefix).cloned())
    }

    async fn create(&self, workflow: &Workflow) -> Result<(), WorkflowStoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state.workflows.contains_key(&workflow.id) {
            return Err(WorkflowStoreError::AlreadyExists(workflow.id.clone()));
        }
        Self::commit(
            &mut inner,
            Operation::WorkflowCreate {
                workflow: workflow.clone(),
            },
        )?;
        Ok(())
    }

    async fn save(
        &self,
        workflow: &Workflow,
        expected_version: u64,
    ) -> Result<(), WorkflowStoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let found = match inner.state.workflows.get(&workflow.id) {
            Some(stored) => stored.version,
            None => return Err(WorkflowStoreError::NotFound(workflow.id.clone())),
        };
        if found != expected_version {
            return Err(WorkflowStoreError::VersionConflict {
                id: workflow.id.clone(),
                expected: expected_version,
                found,
            });
        }
        Self::commit(&mut inner, Operation::transition(workflow))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Workflow>, WorkflowStoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut workflows: Vec<Workflow> = inner.state.workflows.values().cloned().collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(workflows)
    }
}

#[cfg(test)]
#[path = "workflows_tests.rs"]
mod tests;
