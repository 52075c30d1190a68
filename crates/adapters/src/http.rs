// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking HTTP calls run off the async runtime

use keel_core::TraceId;
use std::time::Duration;

/// Header carrying the trace id to downstream services
pub const TRACE_HEADER: &str = "X-Trace-Id";

/// Failure of one HTTP exchange
#[derive(Debug)]
pub(crate) enum HttpFailure {
    Status(u16),
    Transport(String),
    Join(String),
}

pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// GET `url`, returning the status code (non-2xx statuses are values, not failures)
pub(crate) async fn get_status(
    agent: &ureq::Agent,
    url: String,
    trace_id: &TraceId,
) -> Result<u16, HttpFailure> {
    let agent = agent.clone();
    let trace = trace_id.to_string();
    tokio::task::spawn_blocking(move || {
        match agent.get(&url).header(TRACE_HEADER, &trace).call() {
            Ok(response) => Ok(response.status().as_u16()),
            Err(ureq::Error::StatusCode(code)) => Ok(code),
            Err(e) => Err(HttpFailure::Transport(e.to_string())),
        }
    })
    .await
    .map_err(|e| HttpFailure::Join(e.to_string()))?
}

/// POST a JSON body to `url`; any non-2xx status is a failure
pub(crate) async fn post_json(
    agent: &ureq::Agent,
    url: String,
    body: String,
    trace_id: &TraceId,
) -> Result<(), HttpFailure> {
    let agent = agent.clone();
    let trace = trace_id.to_string();
    tokio::task::spawn_blocking(move || {
        match agent
            .post(&url)
            .header(TRACE_HEADER, &trace)
            .header("Content-Type", "application/json")
            .send(&body)
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => Err(HttpFailure::Status(code)),
            Err(e) => Err(HttpFailure::Transport(e.to_string())),
        }
    })
    .await
    .map_err(|e| HttpFailure::Join(e.to_string()))?
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
