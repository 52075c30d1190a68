// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! keel daemon (keeld)
//!
//! Hosts the workflow coordinator, the in-process transport and the semaphore factory,
//! and serves `keel` requests over a Unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod backends;
mod lifecycle;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use keel_daemon::{Config, DaemonPaths, STARTUP_MARKER_PREFIX};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::lifecycle::LifecycleError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = parse_config_arg(std::env::args().skip(1))?;
    let config = Config::load(config_path.as_deref())?;
    let paths = config.paths()?;

    // Write startup marker to log (before tracing setup, so CLI can find it)
    write_startup_marker(&paths)?;

    let log_guard = setup_logging(&paths)?;

    info!(
        style = %config.coordinator.style,
        state_dir = %paths.state_dir.display(),
        "Starting keeld"
    );

    let mut daemon = match lifecycle::startup(&config, &paths).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&paths, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("Daemon ready, listening on {}", paths.socket_path.display());

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    loop {
        tokio::select! {
            result = daemon.listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&daemon.ctx);
                        tokio::spawn(async move {
                            if let Err(e) = server::handle_connection(ctx, stream).await {
                                error!("Error handling connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }

            _ = daemon.ctx.shutdown_signal() => {
                info!("Shutdown requested via IPC, shutting down...");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
        }
    }

    daemon.shutdown().await?;
    info!("Daemon stopped");
    Ok(())
}

/// `keeld [--config <path>]`
fn parse_config_arg(
    mut args: impl Iterator<Item = String>,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            other => return Err(format!("unexpected argument: {other}").into()),
        }
    }
    Ok(config)
}

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(paths: &DaemonPaths) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(paths: &DaemonPaths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    paths: &DaemonPaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = paths.log_path.parent().ok_or_else(|| {
        LifecycleError::Unsupported(format!("log path has no parent: {}", paths.log_path.display()))
    })?;
    let file_name = paths.log_path.file_name().ok_or_else(|| {
        LifecycleError::Unsupported(format!("log path has no file name: {}", paths.log_path.display()))
    })?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
