// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provisioning adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProvisionAdapter, ProvisionError, ProvisionRequest};
use async_trait::async_trait;
use keel_core::{Step, TraceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded provisioning call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionCall {
    pub step: Step,
    pub request: ProvisionRequest,
    pub trace_id: TraceId,
}

/// How the fake answers for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepBehavior {
    #[default]
    Succeed,
    /// Answer with this HTTP status
    Fail(u16),
    /// Sleep before succeeding (for step-timeout tests)
    Delay(Duration),
}

#[derive(Default)]
struct FakeProvisionState {
    behaviors: HashMap<Step, StepBehavior>,
    calls: Vec<ProvisionCall>,
}

/// Fake provisioning adapter for testing
#[derive(Clone, Default)]
pub struct FakeProvisionAdapter {
    inner: Arc<Mutex<FakeProvisionState>>,
}

impl FakeProvisionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, step: Step, behavior: StepBehavior) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.behaviors.insert(step, behavior);
    }

    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .clone()
    }

    pub fn calls_for(&self, step: Step) -> usize {
        self.calls().iter().filter(|c| c.step == step).count()
    }
}

#[async_trait]
impl ProvisionAdapter for FakeProvisionAdapter {
    async fn provision(
        &self,
        step: Step,
        request: &ProvisionRequest,
        trace_id: &TraceId,
    ) -> Result<(), ProvisionError> {
        let behavior = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.calls.push(ProvisionCall {
                step,
                request: request.clone(),
                trace_id: trace_id.clone(),
            });
            inner.behaviors.get(&step).copied().unwrap_or_default()
        };

        match behavior {
            StepBehavior::Succeed => Ok(()),
            StepBehavior::Fail(status) => Err(ProvisionError::Status { step, status }),
            StepBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
