// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-core: pure building blocks for saga coordination and admission control
//!
//! This crate provides:
//! - The workflow event vocabulary and the envelope that carries trace identity
//! - Pure state machines for the orchestrated workflow and the choreography join
//! - The semaphore slot model and configuration
//! - An in-process event bus used as the local transport

pub mod clock;
pub mod context;
pub mod coordination;
pub mod effect;
pub mod event;
pub mod events;
pub mod id;
pub mod operation;
pub mod workflow;

pub use clock::{Clock, FakeClock, SystemClock};
pub use context::TraceId;
pub use coordination::{OwnerId, SemaphoreConfig, SemaphoreConfigError, SemaphoreKeys, SlotSet};
pub use effect::{Effect, TracedEffect};
pub use event::{Envelope, Event};
pub use events::{EventBus, EventPattern, EventReceiver, Route};
pub use id::{IdGen, OwnerIdGen};
pub use operation::Operation;
pub use workflow::{OutcomeJoin, Step, Workflow, WorkflowId, WorkflowState};
