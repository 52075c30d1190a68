// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized workflow state from WAL replay

use keel_core::{Operation, Workflow, WorkflowId};
use std::collections::HashMap;

/// Workflows built from WAL operations
#[derive(Debug, Default)]
pub struct MaterializedState {
    pub workflows: HashMap<WorkflowId, Workflow>,
}

impl MaterializedState {
    /// Get a workflow by ID or unique prefix (like git commit hashes)
    pub fn get_workflow(&self, id: &str) -> Option<&Workflow> {
        if let Some(workflow) = self.workflows.get(&WorkflowId::from(id)) {
            return Some(workflow);
        }

        let matches: Vec<_> = self
            .workflows
            .iter()
            .filter(|(k, _)| k.as_str().starts_with(id))
            .collect();

        // Only return if exactly one match (unambiguous)
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::WorkflowCreate { workflow } => {
                self.workflows
                    .entry(workflow.id.clone())
                    .or_insert_with(|| workflow.clone());
            }

            Operation::WorkflowTransition {
                id,
                state,
                version,
                tasks_succeeded,
                notifications_succeeded,
                failure_reason,
                completed_at,
            } => {
                if let Some(workflow) = self.workflows.get_mut(id) {
                    workflow.state = *state;
                    workflow.version = *version;
                    workflow.tasks_succeeded = *tasks_succeeded;
                    workflow.notifications_succeeded = *notifications_succeeded;
                    workflow.failure_reason = failure_reason.clone();
                    workflow.completed_at = *completed_at;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
