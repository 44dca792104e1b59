//! Integration tests for CLI commands.
//!
//! These run without a live Postgres/SSH stack: node-check subcommands fall
//! back to a `Bad`/`Critical`/`Unknown` classification when the connection
//! attempt itself fails, and `standby` subcommands that need a config file
//! fail with a config error when pointed at one that doesn't exist. Both
//! paths are exercised here instead of requiring a real cluster.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const UNREACHABLE_CONNINFO: &str = "host=127.0.0.1 port=1 connect_timeout=1";

// ============================================================================
// Node-Check Protocol: unreachable database falls back to a failure report
// ============================================================================

#[test]
fn node_check_db_connection_reports_bad_when_unreachable() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "check", "db-connection", "--conninfo", UNREACHABLE_CONNINFO])
        .assert()
        .success()
        .stdout(predicate::str::contains("--db-connection=BAD"));
}

#[test]
fn node_check_archive_ready_reports_critical_when_unreachable() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "node",
            "check",
            "archive-ready",
            "--conninfo",
            UNREACHABLE_CONNINFO,
            "--warning",
            "10",
            "--critical",
            "20",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("--status=CRITICAL"))
        .stdout(predicate::str::contains("--error=DB_CONNECTION"));
}

#[test]
fn node_check_replication_connection_reports_bad_when_unreachable() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "node",
            "check",
            "replication-connection",
            "--conninfo",
            UNREACHABLE_CONNINFO,
            "--remote-node-id",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("--connection=BAD"));
}

#[test]
fn node_check_replication_config_owner_reports_unknown_for_missing_file() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "node",
            "check",
            "replication-config-owner",
            "--config-file",
            "/nonexistent/path/does/not/exist.conf",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("--replication-config-owner=UNKNOWN"));
}

#[test]
fn node_check_replication_config_owner_ok_for_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("recovery.conf");
    std::fs::write(&path, "primary_conninfo = 'host=primary'\n").unwrap();

    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "check", "replication-config-owner", "--config-file", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("--replication-config-owner=OK"));
}

#[test]
fn node_status_without_shutdown_flag_prints_nothing() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "status", "--conninfo", UNREACHABLE_CONNINFO])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn node_status_with_shutdown_flag_reports_unknown_when_unreachable() {
    Command::cargo_bin("repctl")
        .unwrap()
        .args(["node", "status", "--is-shutdown-cleanly", "--conninfo", UNREACHABLE_CONNINFO])
        .assert()
        .success()
        .stdout(predicate::str::contains("--state=UNKNOWN"));
}

// ============================================================================
// `standby` commands: no config file on disk, no reachable database
// ============================================================================
//
// A missing `-f <config-file>` isn't itself an error (config::Config just
// falls back to defaults), so these exercise the next failure a command hits
// without a real cluster: the primary/local-node connection attempt. Setting
// `REPCTL_CONNINFO` (the env source the loader always consults, highest
// precedence) points that attempt at a host that refuses fast rather than
// relying on whatever Postgres may or may not be listening on localhost.

#[test]
fn standby_register_fails_cleanly_against_unreachable_primary() {
    let temp = TempDir::new().unwrap();
    let missing_config = temp.path().join("no-such-repctl.toml");

    Command::cargo_bin("repctl")
        .unwrap()
        .args([
            "-f",
            missing_config.to_str().unwrap(),
            "standby",
            "register",
            "--node-id",
            "3",
            "--node-name",
            "standby3",
            "--conninfo",
            UNREACHABLE_CONNINFO,
        ])
        .assert()
        .failure();
}

#[test]
fn standby_promote_fails_cleanly_against_unreachable_local_node() {
    let temp = TempDir::new().unwrap();
    let missing_config = temp.path().join("no-such-repctl.toml");

    Command::cargo_bin("repctl")
        .unwrap()
        .env("REPCTL_CONNINFO", UNREACHABLE_CONNINFO)
        .args(["-f", missing_config.to_str().unwrap(), "standby", "promote", "--node-id", "3"])
        .assert()
        .failure();
}

#[test]
fn dry_run_flag_is_accepted_alongside_standby_commands() {
    let temp = TempDir::new().unwrap();
    let missing_config = temp.path().join("no-such-repctl.toml");

    Command::cargo_bin("repctl")
        .unwrap()
        .env("REPCTL_CONNINFO", UNREACHABLE_CONNINFO)
        .args([
            "--dry-run",
            "-f",
            missing_config.to_str().unwrap(),
            "standby",
            "unregister",
            "--node-id",
            "3",
        ])
        .assert()
        .failure();
}
