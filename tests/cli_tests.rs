//! CLI tests for the `assertive` binary
//!
//! Covers subcommand parsing, exit codes, report writing through
//! `--record` and `ASSERTIVE_RECORD`, and extra variables.

mod common;

use assert_cmd::Command;
use assertive::callback::report::Report;
use common::fixture;
use predicates::prelude::*;
use tempfile::tempdir;

// Helper to get a command for testing
fn assertive_cmd() -> Command {
    let mut cmd = Command::cargo_bin("assertive").unwrap();
    cmd.env_remove("ASSERTIVE_RECORD")
        .env_remove("ASSERTIVE_CONFIG")
        .env_remove("ASSERTIVE_FORKS")
        .env_remove("ASSERTIVE_FAIL_VERBOSE")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn test_help() {
    Command::cargo_bin("assertive")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_passing_playbook() {
    assertive_cmd()
        .arg("run")
        .arg(fixture("passing.yml"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("PLAY [Service checks]"))
        .stdout(predicate::str::contains("passed: [localhost]  ASSERT(port == 8080)"))
        .stdout(predicate::str::contains("ok: [localhost] => listening on 8080"))
        .stdout(predicate::str::contains(
            "ASSERTIONS: assertions=2 passed=2 failed=0 skipped=0",
        ))
        .stdout(predicate::str::contains(
            "INVOCATIONS: assertions=1 passed=1 failed=0",
        ));
}

#[test]
fn test_non_fatal_failures_exit_zero_and_record() {
    let dir = tempdir().unwrap();
    let report_path = dir.path().join("out.yml");

    assertive_cmd()
        .arg("run")
        .arg(fixture("nonfatal.yml"))
        .arg("--record")
        .arg(&report_path)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("failed: [web2]  ASSERT(workers > 4)"))
        .stdout(predicate::str::contains("failed: too few workers on web2"))
        .stdout(predicate::str::contains("Writing test results to"));

    let report = Report::load(&report_path).unwrap();
    assert_eq!(report.stats.assertions, 4);
    assert_eq!(report.stats.assertions_failed, 1);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].name.as_deref(), Some("Soft checks"));
    let hosts: Vec<_> = report.groups[0].hosts.keys().cloned().collect();
    assert_eq!(hosts.len(), 2);
}

#[test]
fn test_record_from_environment() {
    let dir = tempdir().unwrap();
    let report_path = dir.path().join("env.yml");

    assertive_cmd()
        .env("ASSERTIVE_RECORD", &report_path)
        .arg("run")
        .arg(fixture("passing.yml"))
        .assert()
        .success();

    assert!(report_path.exists());
}

#[test]
fn test_fatal_failure_exits_two() {
    assertive_cmd()
        .arg("run")
        .arg(fixture("fatal.yml"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("fatal: [localhost]: FAILED!"));
}

#[test]
fn test_invalid_playbook_exits_four() {
    assertive_cmd()
        .arg("run")
        .arg(fixture("invalid.yml"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("ERROR!"))
        .stderr(predicate::str::contains("unknown action 'shell'"));
}

#[test]
fn test_missing_playbook_exits_four() {
    assertive_cmd()
        .arg("run")
        .arg("does-not-exist.yml")
        .assert()
        .code(4);
}

#[test]
fn test_unwritable_record_exits_five() {
    let dir = tempdir().unwrap();
    let report_path = dir.path().join("no-such-dir").join("out.yml");

    assertive_cmd()
        .arg("run")
        .arg(fixture("passing.yml"))
        .arg("--record")
        .arg(&report_path)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Failed to write report"));
}

#[test]
fn test_extra_vars_override_play_vars() {
    assertive_cmd()
        .arg("run")
        .arg(fixture("passing.yml"))
        .arg("-e")
        .arg("port=9090")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("failed: [localhost]  ASSERT(port == 8080)"));
}

#[test]
fn test_bad_extra_vars_exit_one() {
    assertive_cmd()
        .arg("run")
        .arg(fixture("passing.yml"))
        .arg("-e")
        .arg("novalue")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("extra variables"));
}

#[test]
fn test_validate() {
    assertive_cmd()
        .arg("validate")
        .arg(fixture("passing.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 play(s), 2 task(s)"));

    assertive_cmd()
        .arg("validate")
        .arg(fixture("invalid.yml"))
        .assert()
        .code(4);
}

#[test]
fn test_config_file_sets_record() {
    let dir = tempdir().unwrap();
    let report_path = dir.path().join("from-config.yml");
    let config_path = dir.path().join("assertive.toml");
    std::fs::write(
        &config_path,
        format!("[assertive]\nrecord = {:?}\n", report_path.display().to_string()),
    )
    .unwrap();

    assertive_cmd()
        .arg("-c")
        .arg(&config_path)
        .arg("run")
        .arg(fixture("passing.yml"))
        .assert()
        .success();

    assert!(report_path.exists());
}
