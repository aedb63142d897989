//! End-to-end tests for the `latte` binary
//!
//! Each test runs the binary inside a temp workspace. Modules without a
//! `ts/` directory skip compilation, so no external compiler is needed.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A workspace with a server-only module `forms`
fn create_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "datalatte/forms/module.json", r#"{"version": "0.3"}"#);
    write(root, "datalatte/forms/php/form.php", "<?php\nclass Form {}\n");
    temp_dir
}

fn latte(dir: &TempDir) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("latte");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("LATTE_TSC")
        .env_remove("LATTE_MINIFIER")
        .env_remove("LATTE_NODE");
    cmd
}

fn release_dir(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("html/datalatte-files/releases/forms")
}

// ============================================================================
// Usage
// ============================================================================

#[test]
fn test_no_module_prints_usage() {
    let dir = TempDir::new().unwrap();

    latte(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_flag_shaped_module_prints_usage() {
    let dir = TempDir::new().unwrap();

    latte(&dir)
        .arg("--frobnicate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_stage_is_rejected() {
    let dir = create_workspace();

    latte(&dir)
        .args(["--abort-after", "linking", "forms"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage 'linking'"));
}

// ============================================================================
// Builds
// ============================================================================

#[test]
fn test_release_build() {
    let dir = create_workspace();

    latte(&dir)
        .args(["--release", "forms"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Compiling forms"));

    let release = release_dir(&dir);
    assert_eq!(
        fs::read_to_string(release.join("forms.php")).unwrap(),
        "<?php\nclass Form {}\n"
    );
    assert!(release.join("module.json.php").exists());
    assert!(dir.path().join("html/datalatte-files/xlatte.json").exists());
}

#[test]
fn test_module_name_is_lowercased() {
    let dir = create_workspace();

    latte(&dir).arg("FORMS").assert().success();

    assert!(release_dir(&dir).is_dir());
}

#[test]
fn test_records_any_alias_is_accepted() {
    let dir = create_workspace();

    latte(&dir).args(["--recordsany", "forms"]).assert().success();

    assert!(release_dir(&dir).is_dir());
}

#[test]
fn test_abort_after_stage() {
    let dir = create_workspace();

    latte(&dir)
        .args(["--release", "--abort-after", "strings", "forms"])
        .assert()
        .success()
        .stderr(predicate::str::contains("stopped after Strings"));

    assert!(release_dir(&dir).is_dir());
    assert!(!release_dir(&dir).join("forms.php").exists());
}

#[test]
fn test_missing_module_exits_cleanly() {
    let dir = TempDir::new().unwrap();

    latte(&dir)
        .arg("ghost")
        .assert()
        .success()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_stub_module_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "datalatte/docs/module.json", "{}");

    latte(&dir)
        .arg("docs")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only a stub"));
}

#[test]
fn test_compiler_spawn_failure() {
    let dir = create_workspace();
    write(dir.path(), "datalatte/forms/ts/form.ts", "export class Form {}");

    latte(&dir)
        .env("LATTE_TSC", "/nonexistent/tsc")
        .arg("forms")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Build of forms failed"));
}

#[test]
fn test_malformed_workspace_config() {
    let dir = create_workspace();
    write(dir.path(), "xlatte.json", "{ not json");

    latte(&dir)
        .arg("forms")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load workspace configuration"));
}

#[test]
fn test_verbose_logs_stages() {
    let dir = create_workspace();

    latte(&dir)
        .args(["--verbose", "forms"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Publish Config"));
}
