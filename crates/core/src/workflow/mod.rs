// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-creation workflow: identity, steps and the two coordination models

mod join;
mod state;

pub use join::{OutcomeJoin, JOIN_FIELD_NOTIFICATIONS, JOIN_FIELD_TASKS};
pub use state::{Workflow, WorkflowState, REASON_NOTIFICATIONS_FAILED, REASON_TASKS_FAILED};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation id of one workflow instance (the project id)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The two provisioning steps that follow project creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Tasks,
    Notifications,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Tasks => "tasks",
            Step::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
