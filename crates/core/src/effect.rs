// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects requested by the coordination state machines

use crate::event::Event;
use crate::workflow::WorkflowId;

/// Side effects that state machines request; the engine executes them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Publish an event on the transport
    Publish(Event),
    /// Drop the choreography join-state of a finalized workflow
    ForgetJoin { correlation_id: WorkflowId },
}

/// Effects that report a name and structured fields to the execution span
pub trait TracedEffect {
    fn name(&self) -> &'static str;

    fn fields(&self) -> Vec<(&'static str, String)>;
}

impl TracedEffect for Effect {
    fn name(&self) -> &'static str {
        match self {
            Effect::Publish(_) => "publish",
            Effect::ForgetJoin { .. } => "forget_join",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Publish(event) => vec![
                ("event", event.name().to_string()),
                ("correlation_id", event.correlation_id().to_string()),
            ],
            Effect::ForgetJoin { correlation_id } => {
                vec![("correlation_id", correlation_id.to_string())]
            }
        }
    }
}

impl Effect {
    /// The event carried by a publish effect
    pub fn published(&self) -> Option<&Event> {
        match self {
            Effect::Publish(event) => Some(event),
            Effect::ForgetJoin { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
