//! CLI error specs

use crate::prelude::*;

#[test]
fn unknown_subcommand_fails() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["frobnicate"])
        .fails()
        .stderr_has("unrecognized subcommand");
}

#[test]
fn unknown_config_key_is_reported() {
    let temp = Sandbox::with_config("[coordinator]\nstlye = \"orchestration\"\n");
    temp.keel()
        .args(&["daemon", "status"])
        .fails()
        .stderr_has("Configuration error")
        .stderr_has("stlye");
}

#[test]
fn missing_config_file_is_reported() {
    let temp = Sandbox::empty();
    let missing = temp.path().join("nope.toml");
    temp.keel()
        .args(&["--config", missing.to_str().unwrap(), "daemon", "status"])
        .fails()
        .stderr_has("nope.toml");
}

#[test]
fn showing_unknown_workflow_suggests_list() {
    let temp = Sandbox::empty();
    temp.keel()
        .args(&["workflow", "show", "does-not-exist"])
        .fails()
        .stderr_has("Workflow 'does-not-exist' not found")
        .stderr_has("keel workflow list");
}
