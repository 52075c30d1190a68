// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! keel - saga coordination and admission control CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, semaphore, workflow};

use crate::client::{DaemonClient, DaemonTarget};
use crate::error::KeelError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "keel",
    version,
    about = "keel - Saga coordination and distributed admission control"
)]
struct Cli {
    /// Daemon config file (defaults to $KEEL_CONFIG)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Start and inspect workflows
    Workflow(workflow::WorkflowArgs),
    /// Inspect and exercise distributed semaphores
    Semaphore(semaphore::SemaphoreArgs),
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run(Cli::parse()).await {
        match e.downcast_ref::<KeelError>() {
            Some(err) => {
                eprint!("{}", err);
                std::process::exit(err.exit_code);
            }
            None => {
                eprintln!("error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let target = DaemonTarget::load(cli.config).map_err(KeelError::from)?;

    // Daemon commands manage the connection themselves
    if let Commands::Daemon(args) = cli.command {
        return daemon::handle(args, &target, cli.output).await;
    }

    let client = DaemonClient::connect_or_start(&target)
        .await
        .map_err(KeelError::from)?;

    match cli.command {
        Commands::Workflow(args) => workflow::handle(args, &client, cli.output).await,
        Commands::Semaphore(args) => semaphore::handle(args, &client, cli.output).await,
        Commands::Daemon(_) => Ok(()),
    }
}

/// Client-side diagnostics go to stderr, quiet unless `RUST_LOG` asks
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
