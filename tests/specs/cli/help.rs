//! CLI help specs

use crate::prelude::*;

#[test]
fn help_lists_command_groups() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["--help"])
        .passes()
        .stdout_has("daemon")
        .stdout_has("workflow")
        .stdout_has("semaphore")
        .stdout_has("--output");
}

#[test]
fn workflow_help_lists_subcommands() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["workflow", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("show")
        .stdout_has("list");
}

#[test]
fn semaphore_run_help_documents_timeouts() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["semaphore", "run", "--help"])
        .passes()
        .stdout_has("--timeout-ms")
        .stdout_has("--hold-ms")
        .stdout_has("--max");
}

#[test]
fn version_flag_prints_version() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["--version"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}
