// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use keel_core::events::EventRecord;
use keel_core::{Envelope, Event, SystemClock, TraceId, Workflow, WorkflowId};
use keel_daemon::protocol::{
    self, EventEntry, Request, Response, SemaphoreStatus, WorkflowDetail, WorkflowSummary,
    DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};
use keel_storage::WorkflowStore;
use tokio::net::UnixStream;
use tracing::{debug, error, info};

use crate::lifecycle::DaemonContext;

const STATE_IN_PROGRESS: &str = "in_progress";
const STATE_COMPLETED: &str = "completed";
const STATE_FAILED: &str = "failed";

/// Handle a single client connection
pub async fn handle_connection(
    ctx: Arc<DaemonContext>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);
    let response = handle_request(&ctx, request).await;
    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
async fn handle_request(ctx: &DaemonContext, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Shutdown => {
            ctx.request_shutdown();
            Response::ShuttingDown
        }

        Request::Status => match catalog(ctx).await {
            Ok(known) => Response::Status {
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                style: ctx.style.to_string(),
                workflows_active: known.values().filter(|k| k.is_active()).count(),
                pending_deliveries: ctx.dispatcher.pending(),
            },
            Err(message) => Response::Error { message },
        },

        Request::StartWorkflow {
            name,
            description,
            owner_id,
            project_id,
        } => {
            let id = project_id.map(WorkflowId::new).unwrap_or_else(WorkflowId::generate);
            let trace_id = TraceId::generate();
            let envelope = Envelope::new(
                Event::WorkflowStarted {
                    correlation_id: id.clone(),
                    name,
                    description,
                    owner_id,
                },
                trace_id.clone(),
                &SystemClock,
            );
            let delivered = ctx.dispatcher.publish(envelope);
            info!(correlation_id = %id, trace_id = %trace_id, delivered, "workflow started");
            Response::WorkflowStarted {
                id: id.to_string(),
                trace_id: trace_id.to_string(),
            }
        }

        Request::ListWorkflows => match catalog(ctx).await {
            Ok(known) => Response::Workflows {
                workflows: known.into_values().map(|k| k.summary).collect(),
            },
            Err(message) => Response::Error { message },
        },

        Request::GetWorkflow { id } => get_workflow(ctx, &id).await,

        Request::SemaphoreStatus { name, max_count } => {
            semaphore_status(ctx, &name, max_count).await
        }

        Request::RunLimited {
            name,
            max_count,
            timeout_ms,
            hold_ms,
        } => run_limited(ctx, &name, max_count, timeout_ms, hold_ms).await,
    }
}

async fn get_workflow(ctx: &DaemonContext, id: &str) -> Response {
    let known = match catalog(ctx).await {
        Ok(known) => known,
        Err(message) => return Response::Error { message },
    };
    let entry = match resolve(&known, id) {
        Ok(entry) => entry,
        Err(message) => return Response::Error { message },
    };
    let Some(entry) = entry else {
        return Response::Workflow { workflow: None };
    };

    let records = {
        let log = ctx.event_log.lock().unwrap_or_else(|e| e.into_inner());
        log.for_workflow(&WorkflowId::new(entry.summary.id.as_str()))
    };
    let events = match records {
        Ok(records) => records.iter().map(event_entry).collect(),
        Err(e) => {
            return Response::Error {
                message: format!("event log: {e}"),
            }
        }
    };

    Response::Workflow {
        workflow: Some(Box::new(WorkflowDetail {
            id: entry.summary.id.clone(),
            name: entry.summary.name.clone(),
            owner_id: entry.owner_id.clone(),
            state: entry.summary.state.clone(),
            failure_reason: entry.summary.failure_reason.clone(),
            version: entry.version,
            events,
        })),
    }
}

async fn semaphore_status(ctx: &DaemonContext, name: &str, max_count: u32) -> Response {
    let semaphore = match ctx.semaphores.create(name, max_count) {
        Ok(s) => s,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };
    let current = match semaphore.current_count().await {
        Ok(current) => current,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };
    Response::Semaphore {
        status: SemaphoreStatus {
            name: name.to_string(),
            max_count,
            current,
            available: current < max_count as usize,
        },
    }
}

async fn run_limited(
    ctx: &DaemonContext,
    name: &str,
    max_count: u32,
    timeout_ms: Option<u64>,
    hold_ms: u64,
) -> Response {
    let timeout = timeout_ms.map(Duration::from_millis);
    let mut semaphore = match ctx.semaphores.create_and_wait(name, max_count, timeout).await {
        Ok(s) => s,
        Err(e) if e.is_admission_rejection() => {
            info!(semaphore = name, "too busy");
            return Response::TooBusy {
                name: name.to_string(),
                message: e.to_string(),
            };
        }
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };

    let owner = semaphore.owner().to_string();
    let started = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(hold_ms)).await;
    let held_ms = started.elapsed().as_millis() as u64;
    let lease_lost = semaphore.lease_lost();

    match semaphore.release().await {
        Ok(()) => Response::Ran {
            name: name.to_string(),
            owner,
            held_ms,
            lease_lost,
        },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

/// What the daemon knows about one workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Known {
    pub summary: WorkflowSummary,
    pub owner_id: String,
    pub version: Option<u64>,
}

impl Known {
    fn is_active(&self) -> bool {
        self.summary.state != STATE_COMPLETED && self.summary.state != STATE_FAILED
    }
}

async fn catalog(ctx: &DaemonContext) -> Result<BTreeMap<String, Known>, String> {
    let workflows = ctx.workflows.list().await.map_err(|e| e.to_string())?;
    let records = {
        let log = ctx.event_log.lock().unwrap_or_else(|e| e.into_inner());
        log.read_all().map_err(|e| format!("event log: {e}"))?
    };
    Ok(build_catalog(&records, &workflows))
}

/// Merge the event history with persisted orchestrated instances
///
/// Choreographed workflows exist only in the event log, so their state is derived from
/// which terminal event (if any) was published. Orchestrated records take precedence.
pub fn build_catalog(records: &[EventRecord], workflows: &[Workflow]) -> BTreeMap<String, Known> {
    let mut known: BTreeMap<String, Known> = BTreeMap::new();

    for record in records {
        let id = record.envelope.correlation_id().to_string();
        match &record.envelope.event {
            Event::WorkflowStarted { name, owner_id, .. } => {
                known.entry(id.clone()).or_insert_with(|| Known {
                    summary: WorkflowSummary {
                        id,
                        name: name.clone(),
                        state: STATE_IN_PROGRESS.to_string(),
                        failure_reason: None,
                    },
                    owner_id: owner_id.clone(),
                    version: None,
                });
            }
            Event::WorkflowCompleted { .. } => {
                if let Some(entry) = known.get_mut(&id) {
                    if entry.summary.state == STATE_IN_PROGRESS {
                        entry.summary.state = STATE_COMPLETED.to_string();
                    }
                }
            }
            Event::WorkflowFailed { reason, .. } => {
                if let Some(entry) = known.get_mut(&id) {
                    if entry.summary.state == STATE_IN_PROGRESS {
                        entry.summary.state = STATE_FAILED.to_string();
                        entry.summary.failure_reason = Some(reason.clone());
                    }
                }
            }
            _ => {}
        }
    }

    for workflow in workflows {
        known.insert(
            workflow.id.to_string(),
            Known {
                summary: WorkflowSummary {
                    id: workflow.id.to_string(),
                    name: workflow.name.clone(),
                    state: workflow.state.to_string(),
                    failure_reason: workflow.failure_reason.clone(),
                },
                owner_id: workflow.owner_id.clone(),
                version: Some(workflow.version),
            },
        );
    }
    known
}

/// Exact id, else a unique prefix
pub fn resolve<'a>(
    known: &'a BTreeMap<String, Known>,
    id: &str,
) -> Result<Option<&'a Known>, String> {
    if let Some(entry) = known.get(id) {
        return Ok(Some(entry));
    }
    let mut matches = known.iter().filter(|(k, _)| k.starts_with(id));
    match (matches.next(), matches.next()) {
        (None, _) => Ok(None),
        (Some((_, entry)), None) => Ok(Some(entry)),
        (Some(_), Some(_)) => Err(format!("ambiguous workflow id prefix: {id}")),
    }
}

fn event_entry(record: &EventRecord) -> EventEntry {
    EventEntry {
        sequence: record.sequence,
        name: record.name.clone(),
        trace_id: record.envelope.trace_id.to_string(),
        timestamp: record.envelope.timestamp.to_rfc3339(),
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
