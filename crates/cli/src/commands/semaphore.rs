// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore commands

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use keel_daemon::SemaphoreStatus;
use serde::Serialize;

use crate::client::{DaemonClient, RunReport};
use crate::error::KeelError;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct SemaphoreArgs {
    #[command(subcommand)]
    pub command: SemaphoreCommand,
}

#[derive(Subcommand)]
pub enum SemaphoreCommand {
    /// Show how many slots of a semaphore are held
    Status {
        /// Semaphore name
        name: String,
        /// Capacity to report availability against
        #[arg(long, default_value_t = 1)]
        max: u32,
    },
    /// Acquire a slot, hold it, then release it
    Run {
        /// Semaphore name
        name: String,
        /// Maximum concurrent holders
        #[arg(long, default_value_t = 1)]
        max: u32,
        /// Give up after waiting this long for a slot (daemon default when absent)
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
        /// How long to hold the slot
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        hold_ms: u64,
    },
}

pub async fn handle(
    args: SemaphoreArgs,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match args.command {
        SemaphoreCommand::Status { name, max } => {
            let status = client
                .semaphore_status(&name, max)
                .await
                .map_err(KeelError::from)?;
            output::print(&StatusView(status), format);
        }
        SemaphoreCommand::Run {
            name,
            max,
            timeout_ms,
            hold_ms,
        } => {
            let report = client
                .run_limited(
                    &name,
                    max,
                    timeout_ms.map(Duration::from_millis),
                    Duration::from_millis(hold_ms),
                )
                .await
                .map_err(KeelError::from)?;
            output::print(&RanView(report), format);
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(transparent)]
struct StatusView(SemaphoreStatus);

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        write!(
            f,
            "{}: {}/{} held ({})",
            s.name,
            s.current,
            s.max_count,
            if s.available { "available" } else { "full" }
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct RanView(RunReport);

impl fmt::Display for RanView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(f, "Held '{}' as {} for {}ms", r.name, r.owner, r.held_ms)?;
        if r.lease_lost {
            write!(f, " (lease lost while held)")?;
        }
        Ok(())
    }
}
