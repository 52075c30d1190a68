// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log

use crate::workflow::{Workflow, WorkflowId, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Record a newly started workflow instance
    WorkflowCreate { workflow: Workflow },

    /// Record the outcome of an applied transition
    WorkflowTransition {
        id: WorkflowId,
        state: WorkflowState,
        version: u64,
        #[serde(default)]
        tasks_succeeded: Option<bool>,
        #[serde(default)]
        notifications_succeeded: Option<bool>,
        #[serde(default)]
        failure_reason: Option<String>,
        #[serde(default)]
        completed_at: Option<DateTime<Utc>>,
    },
}

impl Operation {
    /// Transition record capturing every mutable field of `workflow`
    pub fn transition(workflow: &Workflow) -> Self {
        Operation::WorkflowTransition {
            id: workflow.id.clone(),
            state: workflow.state,
            version: workflow.version,
            tasks_succeeded: workflow.tasks_succeeded,
            notifications_succeeded: workflow.notifications_succeeded,
            failure_reason: workflow.failure_reason.clone(),
            completed_at: workflow.completed_at,
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            Operation::WorkflowCreate { workflow } => &workflow.id,
            Operation::WorkflowTransition { id, .. } => id,
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
