// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission-control primitives for the distributed counting semaphore
//!
//! This module provides:
//! - **SemaphoreConfig** - Capacity, lease and timing parameters
//! - **SemaphoreKeys** - Shared-store key layout for one named semaphore
//! - **SlotSet** - Scored owner set with expiry sweep and capacity-checked insert

pub mod semaphore;
pub mod slots;

pub use semaphore::{OwnerId, SemaphoreConfig, SemaphoreConfigError, SemaphoreKeys};
pub use slots::SlotSet;
