// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ProvisionAdapter, ProvisionError, ProvisionRequest};
use crate::http::{self, HttpFailure};
use async_trait::async_trait;
use keel_core::{Step, TraceId};
use std::time::Duration;

/// Posts to `{tasks_url}/api/tasks/project-setup` and
/// `{notifications_url}/api/notifications/project-setup`
#[derive(Clone)]
pub struct HttpProvisionAdapter {
    tasks_url: Option<String>,
    notifications_url: Option<String>,
    agent: ureq::Agent,
}

impl HttpProvisionAdapter {
    pub fn new(
        tasks_url: Option<String>,
        notifications_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            tasks_url,
            notifications_url,
            agent: http::agent(timeout),
        }
    }

    fn endpoint(&self, step: Step) -> Option<String> {
        match step {
            Step::Tasks => self
                .tasks_url
                .as_deref()
                .map(|base| http::join(base, "api/tasks/project-setup")),
            Step::Notifications => self
                .notifications_url
                .as_deref()
                .map(|base| http::join(base, "api/notifications/project-setup")),
        }
    }
}

#[async_trait]
impl ProvisionAdapter for HttpProvisionAdapter {
    async fn provision(
        &self,
        step: Step,
        request: &ProvisionRequest,
        trace_id: &TraceId,
    ) -> Result<(), ProvisionError> {
        let url = self
            .endpoint(step)
            .ok_or(ProvisionError::NotConfigured(step))?;
        let body = serde_json::to_string(request).map_err(|e| ProvisionError::Request {
            step,
            message: e.to_string(),
        })?;

        http::post_json(&self.agent, url, body, trace_id)
            .await
            .map_err(|failure| match failure {
                HttpFailure::Status(status) => ProvisionError::Status { step, status },
                HttpFailure::Transport(message) | HttpFailure::Join(message) => {
                    ProvisionError::Request { step, message }
                }
            })
    }
}
