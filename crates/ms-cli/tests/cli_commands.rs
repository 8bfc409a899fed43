//! Integration tests: cli commands.
#![allow(deprecated)] // Command::cargo_bin – macro replacement not yet stable

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ms() -> Command {
    Command::cargo_bin("ms").unwrap()
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

// ---------------------------------------------------------------------------
// models
// ---------------------------------------------------------------------------

#[test]
fn models_lists_bundled_models() {
    ms().arg("models")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("two-clocks")
                .and(predicate::str::contains("couples"))
                .and(predicate::str::contains("households"))
                .and(predicate::str::contains("3 models")),
        );
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn run_two_clocks_fires_both_events() {
    ms().args(["run", "two-clocks"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("two-clocks")
                .and(predicate::str::contains("fired: Y,X"))
                .and(predicate::str::contains("done")),
        );
}

#[test]
fn run_unknown_model_fails() {
    ms().args(["run", "no-such-model"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown model"));
}

#[test]
fn run_zero_replicates_fails() {
    ms().args(["run", "two-clocks", "-n", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one replicate"));
}

#[test]
fn run_json_reports_every_replicate() {
    let out = stdout_of(ms().args(["run", "couples", "-n", "3", "--seed", "7", "--json"]));
    let reports: serde_json::Value = serde_json::from_str(&out).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 3);
    for (member, report) in reports.iter().enumerate() {
        assert_eq!(report["member"], member as u64);
        assert_eq!(report["status"], "s");
        assert!(report["events"].as_u64().unwrap() > 0);
        assert!(report.get("error").is_none());
    }
}

#[test]
fn run_is_reproducible_for_a_seed() {
    let args = ["run", "households", "--seed", "3", "--json"];
    let first = stdout_of(ms().args(args));
    let second = stdout_of(ms().args(args));
    assert_eq!(first, second);
}

#[test]
fn run_jit_matches_eager_event_count() {
    let eager: serde_json::Value = serde_json::from_str(&stdout_of(ms().args([
        "run", "couples", "--seed", "11", "--json",
    ])))
    .unwrap();
    let jit: serde_json::Value = serde_json::from_str(&stdout_of(ms().args([
        "run", "couples", "--seed", "11", "--json", "--jit",
    ])))
    .unwrap();
    assert_eq!(eager[0]["events"], jit[0]["events"]);
    assert_eq!(eager[0]["checksum"], jit[0]["checksum"]);
}

#[test]
fn run_trace_prints_events_in_time_order() {
    let out = stdout_of(ms().args(["run", "two-clocks", "--trace"]));
    let y = out.find("Y in entity 1").unwrap();
    let x = out.find("X in entity 1").unwrap();
    assert!(y < x);
    assert!(out.contains("Clock 1 entered"));
}

#[test]
fn run_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(&path, "seed = 99\nevent_checksum = false\n").unwrap();

    let out = stdout_of(ms().args(["run", "two-clocks", "--json", "-c", path.to_str().unwrap()]));
    let reports: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(reports[0]["checksum"], 0.0);
    assert_eq!(reports[0]["events"], 2);
}

#[test]
fn run_rejects_bad_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(&path, "time_policy = \"sometimes\"\n").unwrap();

    ms().args(["run", "two-clocks", "-c", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn run_horizon_stops_early() {
    ms().args(["run", "two-clocks", "--horizon", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fired: Y").and(predicate::str::contains("Y,X").not()));
}
