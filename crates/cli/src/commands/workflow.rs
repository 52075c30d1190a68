// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow commands

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Subcommand};
use keel_daemon::{WorkflowDetail, WorkflowSummary};
use serde::Serialize;

use crate::client::{poll_interval, DaemonClient};
use crate::error::KeelError;
use crate::output::{self, clip, OutputFormat};

#[derive(Args)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Start a project-creation workflow
    Start {
        /// Project name
        name: String,
        /// Project description
        #[arg(long, default_value = "")]
        description: String,
        /// Owner of the new project
        #[arg(long, default_value = "anonymous")]
        owner: String,
        /// Use this id instead of generating one
        #[arg(long)]
        project_id: Option<String>,
        /// Wait up to this many seconds for a terminal state
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },
    /// Show one workflow and its event history
    Show {
        /// Workflow id or unique prefix
        id: String,
    },
    /// List known workflows
    List,
}

pub async fn handle(args: WorkflowArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match args.command {
        WorkflowCommand::Start {
            name,
            description,
            owner,
            project_id,
            wait,
        } => {
            let (id, trace_id) = client
                .start_workflow(&name, &description, &owner, project_id)
                .await
                .map_err(KeelError::from)?;

            let Some(secs) = wait else {
                output::print(&Started { id, trace_id }, format);
                return Ok(());
            };
            let detail = wait_for_terminal(client, &id, Duration::from_secs(secs)).await?;
            let failed = detail.state == "failed";
            output::print(&Detail(detail), format);
            if failed {
                return Err(KeelError::new(format!("Workflow '{}' failed", id)).into());
            }
        }

        WorkflowCommand::Show { id } => match client.get_workflow(&id).await.map_err(KeelError::from)? {
            Some(detail) => output::print(&Detail(detail), format),
            None => return Err(KeelError::workflow_not_found(&id).into()),
        },

        WorkflowCommand::List => {
            let rows: Vec<Row> = client
                .list_workflows()
                .await
                .map_err(KeelError::from)?
                .into_iter()
                .map(Row)
                .collect();
            let header = format!("{:<36} {:<20} {:<26} REASON", "ID", "NAME", "STATE");
            output::print_list(&rows, &header, "No workflows", format);
        }
    }
    Ok(())
}

/// Poll until the workflow has published its completed or failed event
async fn wait_for_terminal(
    client: &DaemonClient,
    id: &str,
    timeout: Duration,
) -> Result<WorkflowDetail> {
    let start = Instant::now();
    loop {
        if let Some(detail) = client.get_workflow(id).await.map_err(KeelError::from)? {
            // Terminal once the terminal event itself is in the history
            let finished = detail
                .events
                .iter()
                .any(|e| e.name == "workflow:completed" || e.name == "workflow:failed");
            if finished {
                return Ok(detail);
            }
        }
        if start.elapsed() >= timeout {
            return Err(KeelError::new(format!("Workflow '{}' still running", id))
                .with_context(format!("No terminal state after {}s", timeout.as_secs()))
                .with_suggestion(format!("Check progress: keel workflow show {}", id))
                .into());
        }
        tokio::time::sleep(poll_interval()).await;
    }
}

#[derive(Serialize)]
struct Started {
    id: String,
    trace_id: String,
}

impl fmt::Display for Started {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Started workflow {} (trace {})", self.id, self.trace_id)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct Row(WorkflowSummary);

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<36} {:<20} {:<26} {}",
            clip(&self.0.id, 36),
            clip(&self.0.name, 20),
            self.0.state,
            self.0.failure_reason.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct Detail(WorkflowDetail);

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = &self.0;
        writeln!(f, "Workflow: {}", w.id)?;
        writeln!(f, "  Name: {}", w.name)?;
        writeln!(f, "  Owner: {}", w.owner_id)?;
        writeln!(f, "  State: {}", w.state)?;
        if let Some(reason) = &w.failure_reason {
            writeln!(f, "  Reason: {}", reason)?;
        }
        if let Some(version) = w.version {
            writeln!(f, "  Version: {}", version)?;
        }
        write!(f, "  Events:")?;
        if w.events.is_empty() {
            write!(f, " none")?;
        }
        for event in &w.events {
            write!(
                f,
                "\n    {:>4} {:<24} {} {}",
                event.sequence, event.name, event.timestamp, event.trace_id
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
