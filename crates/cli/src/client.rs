// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use keel_daemon::protocol::{self, ProtocolError};
use keel_daemon::{
    Config, ConfigError, DaemonPaths, Request, Response, SemaphoreStatus, WorkflowDetail,
    WorkflowSummary, STARTUP_MARKER_PREFIX,
};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("KEEL_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("KEEL_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("KEEL_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("KEEL_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Semaphore '{name}' is at capacity: {message}")]
    TooBusy { name: String, message: String },

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the daemon lives and how to start it
#[derive(Debug, Clone)]
pub struct DaemonTarget {
    /// Passed through to `keeld --config` on auto-start
    pub config_path: Option<PathBuf>,
    pub paths: DaemonPaths,
}

impl DaemonTarget {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ClientError> {
        let config = Config::load(config_path.as_deref())?;
        Ok(Self {
            paths: config.paths()?,
            config_path,
        })
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start(target: &DaemonTarget) -> Result<Self, ClientError> {
        // Restart a daemon left behind by a different build
        if let Ok(daemon_version) = std::fs::read_to_string(&target.paths.version_path) {
            if daemon_version.trim() != env!("CARGO_PKG_VERSION") {
                debug!(daemon_version = daemon_version.trim(), "version mismatch, restarting");
                let _ = daemon_stop(target).await;
            }
        }

        match Self::connect(target) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background(target)?;
                Self::connect_with_retry(target, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, &target.paths)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(target: &DaemonTarget) -> Result<Self, ClientError> {
        if !target.paths.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self {
            socket_path: target.paths.socket_path.clone(),
        })
    }

    async fn connect_with_retry(
        target: &DaemonTarget,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Process exited early: startup failed
            if let Ok(Some(status)) = child.try_wait() {
                // The log may lag the exit slightly
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error(&target.paths.log_path) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(target) {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, &target.paths)),
            }
        }

        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            &target.paths,
        ))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    /// Start a workflow, returning its correlation id and trace id
    pub async fn start_workflow(
        &self,
        name: &str,
        description: &str,
        owner_id: &str,
        project_id: Option<String>,
    ) -> Result<(String, String), ClientError> {
        match self
            .send(Request::StartWorkflow {
                name: name.to_string(),
                description: description.to_string(),
                owner_id: owner_id.to_string(),
                project_id,
            })
            .await?
        {
            Response::WorkflowStarted { id, trace_id } => Ok((id, trace_id)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, ClientError> {
        match self.send(Request::ListWorkflows).await? {
            Response::Workflows { workflows } => Ok(workflows),
            other => Err(unexpected(other)),
        }
    }

    /// Look up one workflow by id or unique prefix
    pub async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowDetail>, ClientError> {
        match self.send(Request::GetWorkflow { id: id.to_string() }).await? {
            Response::Workflow { workflow } => Ok(workflow.map(|b| *b)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn semaphore_status(
        &self,
        name: &str,
        max_count: u32,
    ) -> Result<SemaphoreStatus, ClientError> {
        match self
            .send(Request::SemaphoreStatus {
                name: name.to_string(),
                max_count,
            })
            .await?
        {
            Response::Semaphore { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Hold a semaphore slot for `hold`, waiting at most `timeout` for admission
    pub async fn run_limited(
        &self,
        name: &str,
        max_count: u32,
        timeout: Option<Duration>,
        hold: Duration,
    ) -> Result<RunReport, ClientError> {
        // The daemon answers only after the wait and the hold
        let read_timeout = timeout_ipc() + hold + timeout.unwrap_or(Duration::from_secs(30));
        let request = Request::RunLimited {
            name: name.to_string(),
            max_count,
            timeout_ms: timeout.map(|t| t.as_millis() as u64),
            hold_ms: hold.as_millis() as u64,
        };
        match self
            .send_with_timeout(request, read_timeout, timeout_ipc())
            .await?
        {
            Response::Ran {
                name,
                owner,
                held_ms,
                lease_lost,
            } => Ok(RunReport {
                name,
                owner,
                held_ms,
                lease_lost,
            }),
            Response::TooBusy { name, message } => Err(ClientError::TooBusy { name, message }),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                style,
                workflows_active,
                pending_deliveries,
            } => Ok(DaemonStatus {
                uptime_secs,
                style,
                workflows_active,
                pending_deliveries,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Outcome of a `RunLimited` request
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunReport {
    pub name: String,
    pub owner: String,
    pub held_ms: u64,
    pub lease_lost: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub style: String,
    pub workflows_active: usize,
    pub pending_deliveries: usize,
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(target: &DaemonTarget) -> Result<std::process::Child, ClientError> {
    let keeld = find_keeld_binary();
    debug!(binary = %keeld.display(), "starting daemon");

    let mut command = Command::new(&keeld);
    if let Some(config) = &target.config_path {
        command.arg("--config").arg(config);
    }
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", keeld.display(), e)))
}

/// Stop the daemon (graceful first, then forceful)
///
/// Returns true if the daemon was stopped, false if it wasn't running.
pub async fn daemon_stop(target: &DaemonTarget) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(target) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(&target.paths);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(&target.paths) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(&target.paths);
    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the keeld binary
fn find_keeld_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("KEEL_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Sibling of the current executable (cargo target dir or install prefix)
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("keeld");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("keeld")
}

/// Remove a pid file left behind by a daemon that is no longer running
fn cleanup_stale_pid(paths: &DaemonPaths) {
    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }
}

/// Get the PID from the daemon lock file, if present
pub fn read_daemon_pid(paths: &DaemonPaths) -> Option<u32> {
    std::fs::read_to_string(&paths.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Read the daemon log from the last startup marker, collecting error lines
pub fn read_startup_error(log_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path).ok()?;

    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // Format: "timestamp LEVEL target: message"
    let messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(messages.join("\n"))
    }
}

/// Prefer the daemon's own startup error over a generic connection failure
fn wrap_with_startup_error(err: ClientError, paths: &DaemonPaths) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }
    match read_startup_error(&paths.log_path) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
