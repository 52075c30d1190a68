// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process transport for workflow events
//!
//! This module provides:
//! - `EventBus` - Route envelopes to matching subscribers using patterns
//! - `EventLog` - Append-only audit trail of every published envelope
//! - `Route` - A handler's name and the event patterns it receives

mod bus;
mod log;
mod routing;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use log::{EventLog, EventRecord};
pub use routing::{EventPattern, Route};
