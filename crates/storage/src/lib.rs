// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-storage: durable workflow records and the shared coordination store

pub mod coordination;
mod state;
mod wal;
mod workflows;

pub use coordination::{
    saga_outcomes_key, saga_terminal_key, ChannelSubscription, CoordinationStore,
    MemoryCoordinationStore, StoreError,
};
#[cfg(feature = "redis")]
pub use coordination::RedisCoordinationStore;
pub use state::MaterializedState;
pub use wal::{Wal, WalError};
pub use workflows::{WalWorkflowStore, WorkflowStore, WorkflowStoreError};
