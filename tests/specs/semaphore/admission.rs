//! Semaphore admission specs

use std::thread;

use crate::prelude::*;

#[test]
fn status_of_unused_semaphore_is_empty() {
    let temp = Sandbox::empty();

    temp.keel()
        .args(&["semaphore", "status", "exports", "--max", "2"])
        .passes()
        .stdout_has("exports: 0/2 held (available)");
}

#[test]
fn run_holds_and_releases() {
    let temp = Sandbox::empty();

    let run = temp
        .keel()
        .args(&["-o", "json", "semaphore", "run", "exports", "--hold-ms", "100"])
        .passes();
    let json = run.json();
    assert_eq!(json["name"], "exports");
    assert_eq!(json["lease_lost"], false);
    assert!(json["held_ms"].as_u64().unwrap() >= 100);

    temp.keel()
        .args(&["semaphore", "status", "exports"])
        .passes()
        .stdout_has("0/1 held");
}

#[test]
fn full_semaphore_rejects_with_too_busy() {
    let temp = Sandbox::empty();
    temp.keel().args(&["daemon", "start"]).passes();

    let holder = {
        let cmd = temp
            .keel()
            .args(&["semaphore", "run", "exports", "--hold-ms", "2000"]);
        thread::spawn(move || cmd.passes())
    };

    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        temp.keel()
            .args(&["semaphore", "status", "exports"])
            .passes()
            .stdout
            .contains("1/1 held")
    }));

    temp.keel()
        .args(&["semaphore", "run", "exports", "--timeout-ms", "100", "--hold-ms", "0"])
        .fails()
        .code_is(75)
        .stderr_has("too busy");

    holder.join().unwrap().stdout_has("Held 'exports'");
}
