// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.coordinator.style, CoordinationStyle::Orchestration);
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.semaphore.acquire_timeout, Duration::from_secs(30));
    assert_eq!(config.semaphore.slot_timeout, Duration::from_secs(300));
    assert_eq!(config.semaphore.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(config.semaphore.poll_interval, Duration::from_millis(100));
    config.validate().unwrap();
}

#[test]
fn full_file_parses() {
    let config: Config = toml::from_str(
        r#"
        [daemon]
        socket_path = "/tmp/k/keeld.sock"
        state_dir = "/var/lib/keel"

        [coordinator]
        style = "choreography"
        step_timeout = "3s"
        join_ttl = "10m"
        delivery_attempts = 2

        [semaphore]
        slot_timeout = "2m"
        acquire_timeout = "5s"
        heartbeat_interval = "20s"
        poll_interval = "50ms"

        [store]
        backend = "redis"
        url = "redis://cache:6379"
        key_prefix = "staging"

        [services]
        projects_url = "http://projects:8080"
        tasks_url = "http://tasks:8080"
        request_timeout = "2s"
        "#,
    )
    .unwrap();

    assert_eq!(config.coordinator.style, CoordinationStyle::Choreography);
    assert_eq!(config.coordinator.join_ttl, Duration::from_secs(600));
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.services.notifications_url, None);

    let defaults = config.semaphore.defaults();
    assert_eq!(defaults.slot_timeout, Duration::from_secs(120));
    assert_eq!(defaults.poll_interval, Duration::from_millis(50));

    let paths = config.paths().unwrap();
    assert_eq!(paths.socket_path, PathBuf::from("/tmp/k/keeld.sock"));
    assert_eq!(paths.wal_path, PathBuf::from("/var/lib/keel/wal/workflows.wal"));
    assert_eq!(paths.lock_path, PathBuf::from("/var/lib/keel/daemon.pid"));
}

#[parameterized(
    zero_attempts = { "[coordinator]\ndelivery_attempts = 0" },
    zero_step_timeout = { "[coordinator]\nstep_timeout = \"0s\"" },
    slow_heartbeat = { "[semaphore]\nslot_timeout = \"10s\"\nheartbeat_interval = \"30s\"" },
)]
fn rejects_invalid_values(toml_text: &str) {
    let config: Config = toml::from_str(toml_text).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(toml::from_str::<Config>("[coordinator]\nstlye = \"choreography\"").is_err());
}

#[test]
fn load_reads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.toml");
    std::fs::write(&path, "[coordinator]\nstyle = \"choreography\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.coordinator.style, CoordinationStyle::Choreography);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read(..)));
}

#[test]
fn parse_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[store]\nbackend = \"etcd\"\n").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("bad.toml"));
}
