//! Smoke tests for the sondador CLI
//!
//! Everything here runs without a browser: parsing, listings, configuration
//! layering and the failure exit path.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the sondador binary with a clean environment
fn sondador() -> Command {
    let mut cmd = Command::cargo_bin("sondador").expect("sondador binary should exist");
    for var in [
        "SONDA_BASE_URL",
        "SONDA_TIMEOUT_MS",
        "SONDA_POLL_MS",
        "SONDA_DELAY_MS",
        "CHROMIUM_PATH",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    sondador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help_lists_subcommands() {
    sondador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("kinds"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    sondador().assert().failure();
}

#[test]
fn test_run_help_mentions_report() {
    sondador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--report"))
        .stdout(predicate::str::contains("--fail-fast"));
}

// ============================================================================
// Kinds
// ============================================================================

#[test]
fn test_kinds_text_listing() {
    sondador()
        .arg("kinds")
        .assert()
        .success()
        .stdout(predicate::str::contains("stat-total-alunos"))
        .stdout(predicate::str::contains("#/autor/consulta"));
}

#[test]
fn test_kinds_json_parses() {
    let output = sondador()
        .args(["kinds", "--kind", "aluno", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds = value.as_array().unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds[0]["kind"], "student");
    assert_eq!(kinds[0]["bindings"]["edit_field"], "edit-nome");
}

#[test]
fn test_unknown_kind_rejected() {
    sondador()
        .args(["kinds", "--kind", "livro"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("livro"));
}

// ============================================================================
// Configuration layering
// ============================================================================

#[test]
fn test_config_flag_override() {
    sondador()
        .args(["config", "--timeout-ms", "5000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_ms: 5000"));
}

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sonda.yaml");
    fs::write(
        &path,
        "base_url: http://localhost:8080/app/index.html\nwait:\n  poll_interval_ms: 250\n",
    )
    .unwrap();

    sondador()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "base_url: http://localhost:8080/app/index.html",
        ))
        .stdout(predicate::str::contains("poll_interval_ms: 250"));
}

#[test]
fn test_config_from_environment() {
    sondador()
        .env("SONDA_TIMEOUT_MS", "7000")
        .env("SONDA_BASE_URL", "https://staging.example.com/")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_ms: 7000"))
        .stdout(predicate::str::contains("base_url: https://staging.example.com/"));
}

#[test]
fn test_config_rejects_bad_base_url() {
    sondador()
        .args(["config", "--base-url", "ftp://example.com"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: Configuration error"));
}

#[test]
fn test_config_missing_file() {
    sondador()
        .args(["config", "--config", "/nonexistent/sonda.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_run_with_bad_base_url_exits_nonzero() {
    sondador()
        .args(["run", "--base-url", "ftp://example.com"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("base_url"));
}
