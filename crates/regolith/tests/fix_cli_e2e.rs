//! CLI end-to-end tests for `regolith fix`.
//!
//! These tests spawn the actual `regolith` binary and validate stdout, the
//! files left on disk, and exit codes.
//!
//! Exit code expectations:
//! - 0: Success
//! - 2: Invalid arguments (malformed violation, unknown fixer)
//! - 3: Resolution error (file not found)
//! - 4: Apply error (conflicting moves)

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run regolith in `dir` and return (stdout, stderr, exit_code).
fn run_regolith(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_regolith"))
        .args(args)
        .current_dir(dir)
        .env_remove("REGOLITH_BASE_DIR")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute regolith");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn workspace(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (name, contents) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    (dir, root)
}

// ============================================================================
// Success
// ============================================================================

#[test]
fn fix_rewrites_assignment() {
    let (_dir, root) = workspace(&[("p.rego", "package test\n\nallow = true\n")]);

    let (stdout, _stderr, code) = run_regolith(
        &root,
        &["fix", "--violation", "use-assignment-operator=p.rego:3:7"],
    );

    assert_eq!(code, 0, "stdout: {stdout}");
    assert!(stdout.contains("p.rego:\n- use-assignment-operator\n"));
    assert_eq!(
        fs::read_to_string(root.join("p.rego")).unwrap(),
        "package test\n\nallow := true\n"
    );
}

#[test]
fn json_format_is_parseable() {
    let (_dir, root) = workspace(&[("p.rego", "allow = true\n")]);

    let (stdout, _stderr, code) = run_regolith(
        &root,
        &[
            "fix",
            "--dry-run",
            "--format",
            "json",
            "--violation",
            "use-assignment-operator=p.rego:1:1",
        ],
    );

    assert_eq!(code, 0);
    let json: Value = serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["total_fixes"], 1);
    assert_eq!(json["files"][0]["written"], false);
    assert_eq!(fs::read_to_string(root.join("p.rego")).unwrap(), "allow = true\n");
}

#[test]
fn fixers_lists_defaults() {
    let (_dir, root) = workspace(&[(".regolith.json", r#"{"disabled": ["constant-condition"]}"#)]);
    let (stdout, _stderr, code) = run_regolith(&root, &["fixers"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("use-assignment-operator\n"));
    assert!(!stdout.contains("constant-condition"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn malformed_violation_returns_exit_2() {
    let (_dir, root) = workspace(&[("p.rego", "package p\n")]);
    let (_stdout, _stderr, code) = run_regolith(&root, &["fix", "--violation", "p.rego"]);
    assert_eq!(code, 2);
}

#[test]
fn unknown_fixer_returns_exit_2() {
    let (_dir, root) = workspace(&[("p.rego", "package p\n")]);
    let (_stdout, stderr, code) =
        run_regolith(&root, &["fix", "--violation", "opa-fmt=p.rego:1:1"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("no fixer registered for 'opa-fmt'"));
}

#[test]
fn missing_file_returns_exit_3() {
    let (_dir, root) = workspace(&[("p.rego", "package p\n")]);
    let (_stdout, _stderr, code) = run_regolith(
        &root,
        &["fix", "--violation", "use-assignment-operator=gone.rego:1:1"],
    );
    assert_eq!(code, 3);
}

#[test]
fn conflicting_moves_return_exit_4() {
    let (_dir, root) = workspace(&[("a/p.rego", "package pkg\n"), ("b/p.rego", "package pkg\n")]);
    let (stdout, _stderr, code) = run_regolith(
        &root,
        &[
            "fix",
            "--violation",
            "directory-package-mismatch=a/p.rego:1:1",
            "--violation",
            "directory-package-mismatch=b/p.rego:1:1",
        ],
    );

    assert_eq!(code, 4);
    assert!(stdout.contains("Many to one conflicts:"));
    assert!(root.join("a/p.rego").exists());
    assert!(root.join("b/p.rego").exists());
}
