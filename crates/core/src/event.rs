// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event vocabulary shared by both coordination styles

use crate::clock::Clock;
use crate::context::TraceId;
use crate::workflow::{Step, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events exchanged over the transport
///
/// Each variant holds only the fields relevant to its step; transport metadata lives in
/// [`Envelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    WorkflowStarted {
        correlation_id: WorkflowId,
        name: String,
        description: String,
        owner_id: String,
    },

    CreateTasksRequested {
        correlation_id: WorkflowId,
        name: String,
        owner_id: String,
    },

    SetupNotificationsRequested {
        correlation_id: WorkflowId,
        name: String,
        owner_id: String,
    },

    TasksOutcome {
        correlation_id: WorkflowId,
        success: bool,
    },

    NotificationsOutcome {
        correlation_id: WorkflowId,
        success: bool,
    },

    WorkflowCompleted {
        correlation_id: WorkflowId,
    },

    WorkflowFailed {
        correlation_id: WorkflowId,
        reason: String,
    },
}

impl Event {
    /// Routing name used for subscription patterns (`<subject>:<verb>`)
    pub fn name(&self) -> &'static str {
        match self {
            Event::WorkflowStarted { .. } => "workflow:started",
            Event::CreateTasksRequested { .. } => "tasks:requested",
            Event::SetupNotificationsRequested { .. } => "notifications:requested",
            Event::TasksOutcome { .. } => "tasks:outcome",
            Event::NotificationsOutcome { .. } => "notifications:outcome",
            Event::WorkflowCompleted { .. } => "workflow:completed",
            Event::WorkflowFailed { .. } => "workflow:failed",
        }
    }

    pub fn correlation_id(&self) -> &WorkflowId {
        match self {
            Event::WorkflowStarted { correlation_id, .. }
            | Event::CreateTasksRequested { correlation_id, .. }
            | Event::SetupNotificationsRequested { correlation_id, .. }
            | Event::TasksOutcome { correlation_id, .. }
            | Event::NotificationsOutcome { correlation_id, .. }
            | Event::WorkflowCompleted { correlation_id }
            | Event::WorkflowFailed { correlation_id, .. } => correlation_id,
        }
    }

    /// Request event for a step
    pub fn step_requested(step: Step, correlation_id: WorkflowId, name: String, owner_id: String) -> Self {
        match step {
            Step::Tasks => Event::CreateTasksRequested {
                correlation_id,
                name,
                owner_id,
            },
            Step::Notifications => Event::SetupNotificationsRequested {
                correlation_id,
                name,
                owner_id,
            },
        }
    }

    /// Outcome event for a step
    pub fn step_outcome(step: Step, correlation_id: WorkflowId, success: bool) -> Self {
        match step {
            Step::Tasks => Event::TasksOutcome {
                correlation_id,
                success,
            },
            Step::Notifications => Event::NotificationsOutcome {
                correlation_id,
                success,
            },
        }
    }

    /// The step and result carried by an outcome event
    pub fn as_outcome(&self) -> Option<(Step, bool)> {
        match self {
            Event::TasksOutcome { success, .. } => Some((Step::Tasks, *success)),
            Event::NotificationsOutcome { success, .. } => Some((Step::Notifications, *success)),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::WorkflowCompleted { .. } | Event::WorkflowFailed { .. }
        )
    }
}

/// An event plus the metadata every message carries across the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub trace_id: TraceId,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl Envelope {
    pub fn new(event: Event, trace_id: TraceId, clock: &impl Clock) -> Self {
        Self {
            trace_id,
            timestamp: clock.utc_now(),
            event,
        }
    }

    /// Wrap an event produced while handling `self`, keeping its trace id
    pub fn follow_up(&self, event: Event, clock: &impl Clock) -> Self {
        Self::new(event, self.trace_id.clone(), clock)
    }

    pub fn name(&self) -> &'static str {
        self.event.name()
    }

    pub fn correlation_id(&self) -> &WorkflowId {
        self.event.correlation_id()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
