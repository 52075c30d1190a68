// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file
//!
//! Every field is optional; a missing file section falls back to the documented default.
//! The file is chosen by `--config`, then `KEEL_CONFIG`; with neither, defaults apply.

use keel_core::coordination::semaphore::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_POLL_INTERVAL,
    DEFAULT_SLOT_TIMEOUT,
};
use keel_core::SemaphoreConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "KEEL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("could not determine state directory (set HOME or daemon.state_dir)")]
    NoStateDir,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub daemon: DaemonSection,
    pub coordinator: CoordinatorSection,
    pub semaphore: SemaphoreSection,
    pub store: StoreSection,
    pub services: ServicesSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSection {
    /// Defaults to `$KEEL_SOCKET_DIR/keeld.sock`, else `/tmp/keel/keeld.sock`
    pub socket_path: Option<PathBuf>,
    /// Defaults to `$XDG_STATE_HOME/keel`, else `~/.local/state/keel`
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStyle {
    #[default]
    Orchestration,
    Choreography,
}

impl fmt::Display for CoordinationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinationStyle::Orchestration => f.write_str("orchestration"),
            CoordinationStyle::Choreography => f.write_str("choreography"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorSection {
    pub style: CoordinationStyle,
    /// Upper bound on one downstream provisioning call
    #[serde(with = "humantime_serde")]
    pub step_timeout: Duration,
    /// Lifetime of choreography join-state and terminal claims
    #[serde(with = "humantime_serde")]
    pub join_ttl: Duration,
    /// Deliveries of one envelope to one handler, including the first
    pub delivery_attempts: usize,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            style: CoordinationStyle::default(),
            step_timeout: Duration::from_secs(10),
            join_ttl: Duration::from_secs(60 * 60),
            delivery_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemaphoreSection {
    #[serde(with = "humantime_serde")]
    pub slot_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for SemaphoreSection {
    fn default() -> Self {
        Self {
            slot_timeout: DEFAULT_SLOT_TIMEOUT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SemaphoreSection {
    /// Timing defaults for semaphores created by the daemon
    pub fn defaults(&self) -> SemaphoreConfig {
        SemaphoreConfig::new("default", 1)
            .with_slot_timeout(self.slot_timeout)
            .with_acquire_timeout(self.acquire_timeout)
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_poll_interval(self.poll_interval)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub url: String,
    /// Prepended to every coordination key (Redis only)
    pub key_prefix: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "keel".to_string(),
        }
    }
}

/// Downstream service base URLs; an absent URL selects the no-op adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesSection {
    pub projects_url: Option<String>,
    pub tasks_url: Option<String>,
    pub notifications_url: Option<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            projects_url: None,
            tasks_url: None,
            notifications_url: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Filesystem locations derived from the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub socket_path: PathBuf,
    pub state_dir: PathBuf,
    /// Exclusive lock holding the daemon's pid
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub event_log_path: PathBuf,
}

impl Config {
    /// Load from `explicit`, else from `$KEEL_CONFIG`, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.delivery_attempts == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.delivery_attempts must be at least 1".to_string(),
            ));
        }
        if self.coordinator.step_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "coordinator.step_timeout must be non-zero".to_string(),
            ));
        }
        self.semaphore
            .defaults()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn paths(&self) -> Result<DaemonPaths, ConfigError> {
        let state_dir = match &self.daemon.state_dir {
            Some(dir) => dir.clone(),
            None => default_state_dir()?,
        };
        let socket_path = match &self.daemon.socket_path {
            Some(path) => path.clone(),
            None => default_socket_dir().join("keeld.sock"),
        };
        Ok(DaemonPaths {
            socket_path,
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("workflows.wal"),
            event_log_path: state_dir.join("events.log"),
            state_dir,
        })
    }
}

fn default_state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("keel"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/keel"))
}

/// Short path under /tmp to stay within the socket path length limit
fn default_socket_dir() -> PathBuf {
    std::env::var_os("KEEL_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/keel"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
