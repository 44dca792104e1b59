//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! requiring a live Postgres/SSH stack.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

// ============================================================================
// Top-level help / version
// ============================================================================

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("repctl")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("repctl"));
}

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("repctl")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag_lists_top_level_commands() {
    Command::cargo_bin("repctl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("standby"))
        .stdout(predicate::str::contains("node"));
}

#[test]
fn unrecognized_command_shows_error() {
    Command::cargo_bin("repctl")
        .unwrap()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized"));
}

// ============================================================================
// `standby` subcommands
// ============================================================================

#[test]
fn standby_help_lists_subcommands() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clone"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("unregister"))
        .stdout(predicate::str::contains("promote"))
        .stdout(predicate::str::contains("follow"))
        .stdout(predicate::str::contains("switchover"));
}

#[test]
fn standby_register_requires_node_id() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "register", "--node-name", "standby1", "--conninfo", "host=localhost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn standby_clone_requires_data_directory() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "standby",
            "clone",
            "--upstream-conninfo",
            "host=primary",
            "--node-id",
            "2",
            "--node-name",
            "n2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn standby_clone_help_mentions_copy_external_config_files() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "clone", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("copy-external-config-files"));
}

#[test]
fn standby_switchover_help_mentions_force_rewind() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "switchover", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("force-rewind"));
}

#[test]
fn standby_unregister_requires_node_id() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "unregister"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn standby_promote_requires_node_id() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "promote"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn standby_follow_requires_upstream_node_id() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["standby", "follow"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// ============================================================================
// `node` subcommands
// ============================================================================

#[test]
fn node_help_lists_subcommands() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn node_check_help_lists_checks() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("archive-ready"))
        .stdout(predicate::str::contains("replication-connection"))
        .stdout(predicate::str::contains("data-directory-config"))
        .stdout(predicate::str::contains("replication-config-owner"))
        .stdout(predicate::str::contains("db-connection"));
}

#[test]
fn node_status_requires_conninfo() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "status", "--is-shutdown-cleanly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn node_check_archive_ready_requires_thresholds() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "check", "archive-ready", "--conninfo", "host=localhost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn node_check_data_directory_config_short_circuits_without_db() {
    // This check compares two strings, never touches the network.
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "node",
            "check",
            "data-directory-config",
            "--configured",
            "/data/pg",
            "--actual",
            "/data/pg",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("--configured-data-directory=OK"));
}

#[test]
fn node_check_data_directory_config_mismatch_is_critical() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "node",
            "check",
            "data-directory-config",
            "--configured",
            "/data/pg",
            "--actual",
            "/var/lib/pg",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("--configured-data-directory=CRITICAL"));
}

// ============================================================================
// Global options
// ============================================================================

#[test]
fn dry_run_and_force_are_global_flags() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["--dry-run", "--force", "node", "--help"])
        .assert()
        .success();
}

#[test]
fn config_file_flag_is_global() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["-f", "repctl.toml", "standby", "--help"])
        .assert()
        .success();
}
