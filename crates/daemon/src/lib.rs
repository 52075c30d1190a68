// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! keel-daemon: configuration and the client/daemon wire protocol shared with `keel`

pub mod config;
pub mod protocol;

pub use config::{Config, ConfigError, CoordinationStyle, DaemonPaths, StoreBackend};
pub use protocol::{
    EventEntry, ProtocolError, Request, Response, SemaphoreStatus, WorkflowDetail,
    WorkflowSummary,
};

/// Startup marker prefix written to the log before anything else
///
/// Full format: `--- keeld: starting (pid: 12345) ---`
pub const STARTUP_MARKER_PREFIX: &str = "--- keeld: starting (pid: ";
