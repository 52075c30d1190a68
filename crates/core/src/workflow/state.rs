// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrated workflow state machine

use super::WorkflowId;
use crate::effect::Effect;
use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REASON_TASKS_FAILED: &str = "tasks failed";
pub const REASON_NOTIFICATIONS_FAILED: &str = "notifications failed";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    CreatingTasks,
    SettingUpNotifications,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    /// Position in the forward-only ordering; terminal states share the last rank
    pub fn rank(&self) -> u8 {
        match self {
            WorkflowState::Created => 0,
            WorkflowState::CreatingTasks => 1,
            WorkflowState::SettingUpNotifications => 2,
            WorkflowState::Completed | WorkflowState::Failed => 3,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Created => "created",
            WorkflowState::CreatingTasks => "creating_tasks",
            WorkflowState::SettingUpNotifications => "setting_up_notifications",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One orchestrated project-creation instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub state: WorkflowState,
    pub tasks_succeeded: Option<bool>,
    pub notifications_succeeded: Option<bool>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped on every applied transition; used for optimistic concurrency on save
    pub version: u64,
}

impl Workflow {
    /// Create the instance for a start event, still in `Created`
    ///
    /// Returns `None` for any other event: instances only come into existence on start.
    pub fn from_start(event: &Event, now: DateTime<Utc>) -> Option<Self> {
        match event {
            Event::WorkflowStarted {
                correlation_id,
                name,
                description,
                owner_id,
            } => Some(Self {
                id: correlation_id.clone(),
                name: name.clone(),
                description: description.clone(),
                owner_id: owner_id.clone(),
                state: WorkflowState::Created,
                tasks_succeeded: None,
                notifications_succeeded: None,
                failure_reason: None,
                created_at: now,
                completed_at: None,
                version: 0,
            }),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Handle an event and return the new state plus effects
    ///
    /// Events that do not apply to the current state (duplicates, late or foreign events,
    /// anything after a terminal state) leave the instance untouched and produce no effects.
    pub fn transition(&self, event: &Event, now: DateTime<Utc>) -> (Workflow, Vec<Effect>) {
        let mut workflow = self.clone();
        let mut effects = Vec::new();

        if event.correlation_id() != &self.id || self.is_terminal() {
            return (workflow, effects);
        }

        match (self.state, event) {
            (WorkflowState::Created, Event::WorkflowStarted { .. }) => {
                workflow.state = WorkflowState::CreatingTasks;
                effects.push(Effect::Publish(Event::CreateTasksRequested {
                    correlation_id: self.id.clone(),
                    name: self.name.clone(),
                    owner_id: self.owner_id.clone(),
                }));
            }

            (WorkflowState::CreatingTasks, Event::TasksOutcome { success, .. }) => {
                workflow.tasks_succeeded = Some(*success);
                if *success {
                    workflow.state = WorkflowState::SettingUpNotifications;
                    effects.push(Effect::Publish(Event::SetupNotificationsRequested {
                        correlation_id: self.id.clone(),
                        name: self.name.clone(),
                        owner_id: self.owner_id.clone(),
                    }));
                } else {
                    workflow.fail(REASON_TASKS_FAILED, now);
                    effects.push(workflow.failed_event());
                }
            }

            (
                WorkflowState::SettingUpNotifications,
                Event::NotificationsOutcome { success, .. },
            ) => {
                workflow.notifications_succeeded = Some(*success);
                if *success {
                    workflow.state = WorkflowState::Completed;
                    workflow.completed_at = Some(now);
                    effects.push(Effect::Publish(Event::WorkflowCompleted {
                        correlation_id: self.id.clone(),
                    }));
                } else {
                    workflow.fail(REASON_NOTIFICATIONS_FAILED, now);
                    effects.push(workflow.failed_event());
                }
            }

            // Failure reported by someone else: record it, the event already exists
            (_, Event::WorkflowFailed { reason, .. }) => {
                workflow.fail(reason, now);
            }

            _ => return (workflow, effects),
        }

        workflow.version += 1;
        (workflow, effects)
    }

    fn fail(&mut self, reason: &str, now: DateTime<Utc>) {
        self.state = WorkflowState::Failed;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason.to_string());
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    fn failed_event(&self) -> Effect {
        Effect::Publish(Event::WorkflowFailed {
            correlation_id: self.id.clone(),
            reason: self.failure_reason.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
