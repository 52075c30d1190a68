// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-engine: the saga coordinators and the distributed semaphore

mod choreography;
mod dispatch;
mod error;
mod executor;
mod factory;
mod finalizer;
mod handler;
mod orchestrator;
mod semaphore;
mod steps;

pub use choreography::{WorkflowStarter, REASON_PROJECT_NOT_FOUND};
pub use dispatch::{Dispatcher, RetryPolicy};
pub use error::{RuntimeError, SemaphoreError};
pub use executor::Executor;
pub use factory::SemaphoreFactory;
pub use finalizer::Finalizer;
pub use handler::EventHandler;
pub use orchestrator::Orchestrator;
pub use semaphore::DistributedSemaphore;
pub use steps::ProvisionStepHandler;
