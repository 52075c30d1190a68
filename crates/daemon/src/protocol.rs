// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between `keel` and `keeld`
//!
//! One request and one response per connection. Each message is a JSON document preceded
//! by its length as a 4-byte big-endian integer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read and write bound for one message
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("message of {0} bytes exceeds the limit")]
    MessageTooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,

    Hello {
        version: String,
    },

    Status,

    /// Publish a start event; `project_id` becomes the correlation id when given
    StartWorkflow {
        name: String,
        #[serde(default)]
        description: String,
        owner_id: String,
        #[serde(default)]
        project_id: Option<String>,
    },

    /// Look up by correlation id or unambiguous prefix
    GetWorkflow {
        id: String,
    },

    ListWorkflows,

    SemaphoreStatus {
        name: String,
        max_count: u32,
    },

    /// Take a slot of the named semaphore, hold it for `hold_ms`, then release it
    RunLimited {
        name: String,
        max_count: u32,
        /// Falls back to the configured acquire timeout
        #[serde(default)]
        timeout_ms: Option<u64>,
        hold_ms: u64,
    },

    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,

    Pong,

    Hello {
        version: String,
    },

    ShuttingDown,

    Status {
        uptime_secs: u64,
        style: String,
        workflows_active: usize,
        pending_deliveries: usize,
    },

    WorkflowStarted {
        id: String,
        trace_id: String,
    },

    Workflows {
        workflows: Vec<WorkflowSummary>,
    },

    Workflow {
        workflow: Option<Box<WorkflowDetail>>,
    },

    Semaphore {
        status: SemaphoreStatus,
    },

    /// A limited run held its slot and released it
    Ran {
        name: String,
        owner: String,
        held_ms: u64,
        lease_lost: bool,
    },

    /// No slot freed up within the acquire timeout
    TooBusy {
        name: String,
        message: String,
    },

    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub state: String,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Present for orchestrated instances only
    #[serde(default)]
    pub version: Option<u64>,
    pub events: Vec<EventEntry>,
}

/// One event-log line about a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    pub sequence: u64,
    pub name: String,
    pub trace_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreStatus {
    pub name: String,
    pub max_count: u32,
    pub current: usize,
    pub available: bool,
}

/// Serialize a message to JSON without the length prefix
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len()));
    }
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed message
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(len));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await?;
    Ok(buffer)
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
