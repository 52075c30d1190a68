//! Shared helpers for the black-box specs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

/// Upper bound for polling assertions
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Poll `condition` until it holds or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// Path of a workspace binary, built on first use
///
/// The binaries belong to other workspace packages, so they live in the profile
/// directory above this test executable (`target/<profile>/deps/specs-*`).
pub fn workspace_bin(name: &str) -> PathBuf {
    static BUILT: OnceLock<()> = OnceLock::new();

    let exe = std::env::current_exe().unwrap();
    let profile_dir = exe
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap();
    let path = profile_dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX));

    BUILT.get_or_init(|| {
        let mut build = std::process::Command::new(env!("CARGO"));
        build
            .args(["build", "--quiet", "-p", "keel", "-p", "keel-daemon", "--bins"])
            .arg("--manifest-path")
            .arg(Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"));
        if profile_dir.file_name().is_some_and(|p| p == "release") {
            build.arg("--release");
        }
        let status = build.status().unwrap();
        assert!(status.success(), "building keel binaries failed");
    });
    assert!(path.exists(), "{} not found", path.display());
    path
}

/// An isolated daemon home: config, state directory and socket in one tempdir
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    /// Default settings, orchestration style
    pub fn empty() -> Self {
        Self::with_config("")
    }

    /// `extra` is appended to the generated config
    pub fn with_config(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Self { dir };
        let config = format!(
            "[daemon]\nstate_dir = \"{}\"\nsocket_path = \"{}\"\n\n{}",
            sandbox.state_path().display(),
            sandbox.socket_path().display(),
            extra
        );
        std::fs::write(sandbox.config_path(), config).unwrap();
        sandbox
    }

    pub fn choreography() -> Self {
        Self::with_config("[coordinator]\nstyle = \"choreography\"\n")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("keeld.sock")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("keel.toml")
    }

    /// Write a file relative to the sandbox root
    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// `keel --config <sandbox>` with the daemon binary pinned
    pub fn keel(&self) -> CliBuilder {
        let mut cmd = Command::new(workspace_bin("keel"));
        cmd.env("KEEL_DAEMON_BINARY", workspace_bin("keeld"))
            .env_remove("KEEL_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_path());
        CliBuilder { cmd }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.socket_path().exists() {
            let _ = self.keel().args(&["daemon", "stop"]).cmd.ok();
        }
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert::from(output);
        assert_eq!(
            run.code,
            Some(0),
            "expected success\nstdout:\n{}\nstderr:\n{}",
            run.stdout,
            run.stderr
        );
        run
    }

    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert::from(output);
        assert_ne!(
            run.code,
            Some(0),
            "expected failure\nstdout:\n{}\nstderr:\n{}",
            run.stdout,
            run.stderr
        );
        run
    }
}

pub struct RunAssert {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for RunAssert {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl RunAssert {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout.contains(needle),
            "stdout missing {needle:?}:\n{}",
            self.stdout
        );
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stdout.contains(needle),
            "stdout unexpectedly has {needle:?}:\n{}",
            self.stdout
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr.contains(needle),
            "stderr missing {needle:?}:\n{}",
            self.stderr
        );
        self
    }

    pub fn stderr_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stderr.contains(needle),
            "stderr unexpectedly has {needle:?}:\n{}",
            self.stderr
        );
        self
    }

    pub fn code_is(self, code: i32) -> Self {
        assert_eq!(self.code, Some(code), "stderr:\n{}", self.stderr);
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout).unwrap()
    }
}
