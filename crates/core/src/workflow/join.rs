// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Choreography join: the two step outcomes gathered for one workflow

use super::{Step, WorkflowId};
use crate::effect::Effect;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field name of the tasks outcome in the shared join record
pub const JOIN_FIELD_TASKS: &str = "tasks";
/// Field name of the notifications outcome in the shared join record
pub const JOIN_FIELD_NOTIFICATIONS: &str = "notifications";

/// Outcomes recorded so far for one workflow
///
/// Each field is written at most once per step; a redelivered outcome overwrites the same
/// field with the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeJoin {
    pub tasks: Option<bool>,
    pub notifications: Option<bool>,
}

impl OutcomeJoin {
    pub fn field_name(step: Step) -> &'static str {
        match step {
            Step::Tasks => JOIN_FIELD_TASKS,
            Step::Notifications => JOIN_FIELD_NOTIFICATIONS,
        }
    }

    /// Encoded field value as stored in the join record
    pub fn field_value(success: bool) -> &'static str {
        if success {
            "true"
        } else {
            "false"
        }
    }

    /// Rebuild a join from the stored fields; unknown fields and unparsable values are skipped
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let parse = |key: &str| fields.get(key).and_then(|v| v.parse::<bool>().ok());
        Self {
            tasks: parse(JOIN_FIELD_TASKS),
            notifications: parse(JOIN_FIELD_NOTIFICATIONS),
        }
    }

    pub fn record(&mut self, step: Step, success: bool) {
        match step {
            Step::Tasks => self.tasks = Some(success),
            Step::Notifications => self.notifications = Some(success),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.is_some() && self.notifications.is_some()
    }

    /// Terminal event once both outcomes are known
    pub fn verdict(&self, correlation_id: &WorkflowId) -> Option<Event> {
        let (tasks, notifications) = (self.tasks?, self.notifications?);
        let correlation_id = correlation_id.clone();
        if tasks && notifications {
            Some(Event::WorkflowCompleted { correlation_id })
        } else {
            Some(Event::WorkflowFailed {
                correlation_id,
                reason: format!("tasks: {tasks}, notifications: {notifications}"),
            })
        }
    }

    /// Effects for the instance that won the terminal claim: emit the verdict, drop the join
    pub fn finalize(&self, correlation_id: &WorkflowId) -> Vec<Effect> {
        match self.verdict(correlation_id) {
            Some(event) => vec![
                Effect::Publish(event),
                Effect::ForgetJoin {
                    correlation_id: correlation_id.clone(),
                },
            ],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "join_tests.rs"]
mod tests;
