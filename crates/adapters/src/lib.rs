// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the external services a workflow talks to

mod http;
pub mod projects;
pub mod provision;
pub mod traced;

pub use http::TRACE_HEADER;
pub use projects::{DirectoryError, HttpProjectDirectory, NoOpProjectDirectory, ProjectDirectory};
pub use provision::{
    HttpProvisionAdapter, NoOpProvisionAdapter, ProvisionAdapter, ProvisionError,
    ProvisionRequest,
};
pub use traced::{TracedProjectDirectory, TracedProvisionAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use projects::{DirectoryCall, FakeProjectDirectory};
#[cfg(any(test, feature = "test-support"))]
pub use provision::{FakeProvisionAdapter, ProvisionCall, StepBehavior};
