// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use std::fmt;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::client::{self, ClientError, DaemonClient, DaemonStatus, DaemonTarget};
use crate::error::KeelError;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Show whether the daemon is running and what it is doing
    Status,
}

pub async fn handle(args: DaemonArgs, target: &DaemonTarget, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start => start(target).await,
        DaemonCommand::Stop => stop(target).await,
        DaemonCommand::Status => status(target, format).await,
    }
}

async fn start(target: &DaemonTarget) -> Result<()> {
    if let Ok(client) = DaemonClient::connect(target) {
        if client.hello().await.is_ok() {
            println!("Daemon already running");
            return Ok(());
        }
    }
    let client = DaemonClient::connect_or_start(target)
        .await
        .map_err(KeelError::from)?;
    let version = client.hello().await.map_err(KeelError::from)?;
    println!("Daemon started (version {})", version);
    Ok(())
}

async fn stop(target: &DaemonTarget) -> Result<()> {
    if client::daemon_stop(target).await.map_err(KeelError::from)? {
        println!("Daemon stopped");
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

/// Status view; `running: false` carries no other fields
#[derive(Serialize)]
struct StatusView {
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(flatten)]
    status: Option<DaemonStatus>,
    log_path: String,
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(status) = &self.status else {
            return write!(f, "Daemon not running\n  Log: {}", self.log_path);
        };
        writeln!(
            f,
            "Daemon running (version {})",
            self.version.as_deref().unwrap_or("unknown")
        )?;
        writeln!(f, "  Uptime: {}s", status.uptime_secs)?;
        writeln!(f, "  Style: {}", status.style)?;
        writeln!(f, "  Active workflows: {}", status.workflows_active)?;
        writeln!(f, "  Pending deliveries: {}", status.pending_deliveries)?;
        write!(f, "  Log: {}", self.log_path)
    }
}

async fn status(target: &DaemonTarget, format: OutputFormat) -> Result<()> {
    let log_path = target.paths.log_path.display().to_string();
    let view = match DaemonClient::connect(target) {
        Ok(client) => match client.status().await {
            Ok(status) => StatusView {
                running: true,
                version: client.hello().await.ok(),
                status: Some(status),
                log_path,
            },
            // Stale socket left by a crashed daemon
            Err(ClientError::Io(_)) => StatusView {
                running: false,
                version: None,
                status: None,
                log_path,
            },
            Err(e) => return Err(KeelError::from(e).into()),
        },
        Err(ClientError::DaemonNotRunning) => StatusView {
            running: false,
            version: None,
            status: None,
            log_path,
        },
        Err(e) => return Err(KeelError::from(e).into()),
    };
    output::print(&view, format);
    Ok(())
}
