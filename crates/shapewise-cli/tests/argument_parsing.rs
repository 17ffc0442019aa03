//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! touching an initialized project.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shapewise() -> Command {
    let mut cmd = Command::cargo_bin("shapewise").unwrap();
    cmd.arg("--no-color");
    cmd
}

// ============================================================================
// Commands That Work Without a Project
// ============================================================================

#[test]
fn version_command_succeeds() {
    shapewise()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shapewise"))
        .stdout(predicate::str::contains(
            "pauseAfterReadingQuerySettingsConfigurationParameter",
        ));
}

#[test]
fn version_flag_shows_version() {
    shapewise()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shapewise"));
}

#[test]
fn help_flag_shows_usage() {
    shapewise()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lose updates"));
}

#[test]
fn shape_prints_hash_without_project() {
    let temp = TempDir::new().unwrap();

    shapewise()
        .args(["shape", "--ns", "shop.orders", "--filter", r#"{"status": "open"}"#])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[0-9A-F]{64}\n$").unwrap());
}

#[test]
fn shape_ignores_literal_values() {
    let hash_of = |filter: &str| {
        let output = shapewise()
            .args(["shape", "--ns", "shop.orders", "--filter", filter])
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap()
    };

    assert_eq!(hash_of(r#"{"a": 1}"#), hash_of(r#"{"a": 2}"#));
    assert_ne!(hash_of(r#"{"a": 1}"#), hash_of(r#"{"b": 1}"#));
}

#[test]
fn shape_debug_shape_shows_placeholders() {
    shapewise()
        .args([
            "shape",
            "--ns",
            "shop.orders",
            "--filter",
            r#"{"a": 1}"#,
            "--debug-shape",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("?number"));
}

// ============================================================================
// Argument Validation
// ============================================================================

#[test]
fn set_requires_settings() {
    shapewise()
        .args(["set", "--ns", "shop.orders"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--settings"));
}

#[test]
fn hash_conflicts_with_query_flags() {
    shapewise()
        .args([
            "remove",
            "--ns",
            "shop.orders",
            "--hash",
            &"A".repeat(64),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn pipeline_conflicts_with_filter() {
    shapewise()
        .args([
            "shape",
            "--ns",
            "shop.orders",
            "--filter",
            "{}",
            "--pipeline",
            "[]",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn shape_without_namespace_is_invalid_argument() {
    shapewise()
        .args(["shape", "--filter", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidArgument"));
}

#[test]
fn malformed_json_is_invalid_argument() {
    shapewise()
        .args(["shape", "--ns", "shop.orders", "--filter", "{oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidArgument"))
        .stderr(predicate::str::contains("--filter"));
}

#[test]
fn set_help_lists_query_flags() {
    shapewise()
        .args(["set", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--ns"))
        .stdout(predicate::str::contains("--pipeline"))
        .stdout(predicate::str::contains("--hash"));
}

#[test]
fn list_requires_initialized_project() {
    let temp = TempDir::new().unwrap();

    shapewise()
        .args(["list", "--project", temp.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
