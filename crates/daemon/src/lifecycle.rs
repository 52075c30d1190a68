// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::{File, OpenOptions};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use fs2::FileExt;
use keel_adapters::{TracedProjectDirectory, TracedProvisionAdapter};
use keel_core::events::EventLog;
use keel_core::{EventBus, OwnerIdGen, Step, SystemClock};
use keel_daemon::{Config, ConfigError, CoordinationStyle, DaemonPaths};
use keel_engine::{
    Dispatcher, EventHandler, Finalizer, Orchestrator, ProvisionStepHandler, RetryPolicy,
    SemaphoreFactory, WorkflowStarter,
};
use keel_storage::{StoreError, WalError, WalWorkflowStore, WorkflowStore};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backends::{CoordinationBackend, Directory, Provisioner};

pub type DaemonSemaphores = SemaphoreFactory<CoordinationBackend, SystemClock>;

/// State shared by every connection handler
pub struct DaemonContext {
    pub style: CoordinationStyle,
    pub dispatcher: Dispatcher,
    pub workflows: Arc<WalWorkflowStore>,
    pub event_log: Arc<Mutex<EventLog>>,
    pub semaphores: DaemonSemaphores,
    pub start_time: Instant,
    shutdown: Notify,
}

impl DaemonContext {
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once a client has asked the daemon to stop
    pub async fn shutdown_signal(&self) {
        self.shutdown.notified().await;
    }
}

/// Daemon state during operation
pub struct Daemon {
    pub paths: DaemonPaths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    pub ctx: Arc<DaemonContext>,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // Let in-flight deliveries finish so their outcomes reach the log
        let drain = self.ctx.dispatcher.wait_idle();
        if tokio::time::timeout(std::time::Duration::from_secs(5), drain)
            .await
            .is_err()
        {
            warn!(
                pending = self.ctx.dispatcher.pending(),
                "shutting down with deliveries in flight"
            );
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }

        for path in [
            &self.paths.socket_path,
            &self.paths.lock_path,
            &self.paths.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("coordination store: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unsupported(String),
}

/// Start the daemon
pub async fn startup(config: &Config, paths: &DaemonPaths) -> Result<Daemon, LifecycleError> {
    match startup_inner(config, paths).await {
        Ok(daemon) => Ok(daemon),
        // The socket and lock belong to the daemon that holds the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(paths);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config, paths: &DaemonPaths) -> Result<Daemon, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&paths.state_dir)?;
    if let Some(parent) = paths.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents two daemons sharing one WAL
    // Open without truncating: the file may belong to a running daemon
    let mut lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    {
        use std::io::Write;
        writeln!(lock_file, "{}", std::process::id())?;
    }
    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Durable state
    let workflows = Arc::new(WalWorkflowStore::open(&paths.wal_path)?);
    reconcile_state(workflows.as_ref()).await;
    let event_log = Arc::new(Mutex::new(EventLog::open(paths.event_log_path.clone())?));

    // 4. Shared coordination store
    let store = Arc::new(CoordinationBackend::connect(&config.store).await?);
    info!(backend = store.kind(), "coordination store ready");

    // 5. Handlers for the configured style
    let handlers = build_handlers(config, &workflows, &store);
    let bus = Arc::new(EventBus::new());
    let dispatcher = Dispatcher::new(
        Arc::clone(&bus),
        handlers,
        RetryPolicy {
            max_attempts: config.coordinator.delivery_attempts,
            ..RetryPolicy::default()
        },
    );

    let mut tasks = vec![spawn_audit(&bus, Arc::clone(&event_log))];
    tasks.extend(dispatcher.start());
    info!(
        style = %config.coordinator.style,
        handlers = ?dispatcher.handler_names(),
        "coordinator started"
    );

    let semaphores = SemaphoreFactory::new(
        store,
        SystemClock,
        OwnerIdGen::from_env(),
        config.semaphore.defaults(),
    );

    // 6. Remove stale socket and bind (LAST - only after all validation passes)
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    Ok(Daemon {
        paths: paths.clone(),
        lock_file,
        listener,
        ctx: Arc::new(DaemonContext {
            style: config.coordinator.style,
            dispatcher,
            workflows,
            event_log,
            semaphores,
            start_time: Instant::now(),
            shutdown: Notify::new(),
        }),
        tasks,
    })
}

/// Exactly one coordination style reacts to start events
fn build_handlers(
    config: &Config,
    workflows: &Arc<WalWorkflowStore>,
    store: &Arc<CoordinationBackend>,
) -> Vec<Arc<dyn EventHandler>> {
    let provisioner = TracedProvisionAdapter::new(Provisioner::from_config(&config.services));
    let step_timeout = config.coordinator.step_timeout;

    let mut handlers: Vec<Arc<dyn EventHandler>> = [Step::Tasks, Step::Notifications]
        .into_iter()
        .map(|step| {
            Arc::new(ProvisionStepHandler::new(
                step,
                provisioner.clone(),
                step_timeout,
                SystemClock,
            )) as Arc<dyn EventHandler>
        })
        .collect();

    match config.coordinator.style {
        CoordinationStyle::Orchestration => {
            handlers.push(Arc::new(Orchestrator::new(Arc::clone(workflows), SystemClock)));
        }
        CoordinationStyle::Choreography => {
            let directory = TracedProjectDirectory::new(Directory::from_config(&config.services));
            handlers.push(Arc::new(WorkflowStarter::new(directory, SystemClock)));
            handlers.push(Arc::new(Finalizer::new(
                Arc::clone(store),
                SystemClock,
                config.coordinator.join_ttl,
            )));
        }
    }
    handlers
}

/// Append every published envelope to the event log
fn spawn_audit(bus: &EventBus, event_log: Arc<Mutex<EventLog>>) -> JoinHandle<()> {
    let mut rx = bus.set_global_handler();
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let mut log = event_log.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = log.append(envelope) {
                warn!(error = %e, "failed to append to event log");
            }
        }
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(paths: &DaemonPaths) {
    for path in [&paths.socket_path, &paths.version_path, &paths.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Report instances a previous run left mid-flight
///
/// Their next step was requested on a transport that did not survive the restart.
async fn reconcile_state(workflows: &WalWorkflowStore) {
    let all = match workflows.list().await {
        Ok(all) => all,
        Err(e) => {
            warn!(error = %e, "could not list workflows");
            return;
        }
    };
    info!("Loaded state: {} workflows", all.len());

    let in_progress: Vec<_> = all.iter().filter(|w| !w.is_terminal()).collect();
    if !in_progress.is_empty() {
        warn!(
            "Found {} in-progress workflows from previous run (their pending step will not be redelivered)",
            in_progress.len()
        );
        for w in &in_progress {
            warn!("  - {} ({}): {}", w.id, w.name, w.state);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
