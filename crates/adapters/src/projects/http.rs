// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{DirectoryError, ProjectDirectory};
use crate::http::{self, HttpFailure};
use async_trait::async_trait;
use keel_core::{TraceId, WorkflowId};
use std::time::Duration;

/// Looks projects up with `GET {base}/api/projects/{id}`
#[derive(Clone)]
pub struct HttpProjectDirectory {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpProjectDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            agent: http::agent(timeout),
        }
    }
}

#[async_trait]
impl ProjectDirectory for HttpProjectDirectory {
    async fn exists(&self, id: &WorkflowId, trace_id: &TraceId) -> Result<bool, DirectoryError> {
        let url = http::join(&self.base_url, &format!("api/projects/{id}"));
        match http::get_status(&self.agent, url, trace_id).await {
            Ok(code) if (200..300).contains(&code) => Ok(true),
            Ok(404) => Ok(false),
            Ok(code) => Err(DirectoryError::Status(code)),
            Err(HttpFailure::Status(code)) => Err(DirectoryError::Status(code)),
            Err(HttpFailure::Transport(e)) | Err(HttpFailure::Join(e)) => {
                Err(DirectoryError::Request(e))
            }
        }
    }
}
