use std::path::PathBuf;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn drover(state: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_drover"));
    cmd.env("DROVER_DIR", state.path());
    cmd
}

// Job commands go through a lossy whitespace join, so tests keep each
// command to bare words and put the interesting parts in a script.
fn write_script(state: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = state.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Re-invoke drover until its stdout carries `needle`, or panic.
fn wait_for_stdout(state: &TempDir, args: &[&str], needle: &str) {
    for _ in 0..100 {
        let out = drover(state).args(args).output().unwrap();
        if String::from_utf8_lossy(&out.stdout).contains(needle) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("`drover {}` never printed {needle:?}", args.join(" "));
}

#[test]
fn help_hides_the_internal_surface() {
    let state = TempDir::new().unwrap();
    drover(&state)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("kill"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("shepherd").not());
}

#[test]
fn bare_invocation_prints_an_empty_table() {
    let state = TempDir::new().unwrap();
    drover(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs yet"));
}

#[test]
fn run_detaches_and_the_record_goes_live() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "nap.sh", "sleep 3\n");

    drover(&state)
        .args(["run", "-n", "nap", "sh"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Started job 1"));

    // The launcher is long gone; only the detached shepherd can flip
    // the record to running.
    wait_for_stdout(&state, &["status", "nap"], "running");

    drover(&state)
        .args(["kill", "nap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Killed 1"));
    wait_for_stdout(&state, &["status", "nap"], "failed");
}

#[test]
fn check_surfaces_immediate_failure() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "boom.sh", "echo boom >&2\nexit 7\n");

    drover(&state)
        .args(["run", "--check", "sh"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("boom"))
        .stderr(predicate::str::contains("died immediately"));
}

#[test]
fn status_json_round_trips() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "ok.sh", "exit 0\n");

    drover(&state)
        .args(["run", "--check", "-n", "fin", "sh"])
        .arg(&script)
        .assert()
        .success();
    wait_for_stdout(&state, &["status", "fin"], "success");

    let out = drover(&state).args(["status", "--json"]).output().unwrap();
    assert!(out.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(rows[0]["name"], "fin");
    assert_eq!(rows[0]["status"], "success");
    assert_eq!(rows[0]["return_code"], 0);
}

#[test]
fn unknown_alias_is_an_error() {
    let state = TempDir::new().unwrap();
    drover(&state)
        .args(["status", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such job"));
}

#[test]
fn duplicate_names_are_rejected() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "ok.sh", "exit 0\n");

    drover(&state)
        .args(["run", "--check", "-n", "twin", "sh"])
        .arg(&script)
        .assert()
        .success();
    wait_for_stdout(&state, &["status", "twin"], "success");

    drover(&state)
        .args(["run", "-n", "twin", "sh"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already taken"));
}

#[test]
fn clean_sweeps_finished_records() {
    let state = TempDir::new().unwrap();
    let ok = write_script(&state, "ok.sh", "exit 0\n");
    let bad = write_script(&state, "bad.sh", "exit 3\n");

    drover(&state)
        .args(["run", "--check", "sh"])
        .arg(&ok)
        .assert()
        .success();
    drover(&state)
        .args(["run", "--check", "sh"])
        .arg(&bad)
        .assert()
        .failure();
    wait_for_stdout(&state, &["status", "1"], "success");
    wait_for_stdout(&state, &["status", "2"], "failed");

    drover(&state)
        .args(["clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned 1"));
    drover(&state)
        .args(["clean", "--failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned 1"));
    drover(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs yet"));
}

#[test]
fn logs_prints_captured_output() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "say.sh", "echo captured-line\n");

    drover(&state)
        .args(["run", "--check", "-n", "say", "sh"])
        .arg(&script)
        .assert()
        .success();
    wait_for_stdout(&state, &["status", "say"], "success");

    drover(&state)
        .args(["logs", "say"])
        .assert()
        .success()
        .stdout(predicate::str::contains("captured-line"));
}

#[test]
fn kill_all_sweeps_active_jobs() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "nap.sh", "sleep 3\n");

    for name in ["first", "second"] {
        drover(&state)
            .args(["run", "-n", name, "sh"])
            .arg(&script)
            .assert()
            .success();
        wait_for_stdout(&state, &["status", name], "running");
    }

    drover(&state)
        .args(["kill", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Killed 2"));
}

#[test]
fn pause_and_resume_through_the_cli() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "nap.sh", "sleep 3\n");

    drover(&state)
        .args(["run", "-n", "nap", "sh"])
        .arg(&script)
        .assert()
        .success();
    wait_for_stdout(&state, &["status", "nap"], "running");

    drover(&state)
        .args(["pause", "nap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Paused job"));
    wait_for_stdout(&state, &["status", "nap"], "paused");

    drover(&state)
        .args(["resume", "nap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resumed job"));
    wait_for_stdout(&state, &["status", "nap"], "running");

    drover(&state).args(["kill", "nap"]).assert().success();
}

#[test]
fn restart_gives_a_fresh_id() {
    let state = TempDir::new().unwrap();
    let script = write_script(&state, "ok.sh", "exit 0\n");

    drover(&state)
        .args(["run", "--check", "-n", "again", "sh"])
        .arg(&script)
        .assert()
        .success();
    wait_for_stdout(&state, &["status", "again"], "success");

    drover(&state)
        .args(["restart", "again"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restarted as job 2"));

    // The name rides along to the replacement, which runs for real.
    wait_for_stdout(&state, &["status", "again"], "success");
}
