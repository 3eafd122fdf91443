//! Command-line behaviour of the `nip-harness` binary: exit codes and output modes

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

const EXIT_PASSED: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;

/// Table with one passing and one failing experiment.
fn write_table(dir: &Path) -> std::path::PathBuf {
    let table = json!({
        "score": {
            "log": "logs/score.log",
            "command": "mkdir -p {root}/out/{cam} && echo '{{\"score\": 0.9}}' > {root}/out/{cam}/r.json",
            "files": ["out/{}/r.json"],
            "performance": {
                "file": "out/{}/r.json",
                "values": {"score": 0.5}
            }
        },
        "crash": {
            "log": "logs/crash.log",
            "command": "echo boom; exit 3",
            "files": []
        }
    });
    let path = dir.join("table.json");
    fs::write(&path, table.to_string()).unwrap();
    path
}

fn harness(table: &Path, root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nip-harness"))
        .arg("--table")
        .arg(table)
        .arg("--root")
        .arg(root)
        .args(["--cam", "D90"])
        .args(args)
        .env_remove("NIP_HARNESS_TABLE")
        .env_remove("NIP_HARNESS_CAM")
        .env_remove("NIP_HARNESS_ROOT")
        .env_remove("NIP_HARNESS_TIMEOUT")
        .env_remove("NIP_HARNESS_JOBS")
        .env_remove("RUST_LOG")
        .output()
        .expect("binary must start")
}

fn setup() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let table = write_table(dir.path());
    let root = dir.path().join("out-root");
    (dir, table, root)
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_passing_experiment_exits_zero() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &["score"]);
    assert_eq!(out.status.code(), Some(EXIT_PASSED), "{out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("PASS"));
    assert!(stdout.contains("1 experiment(s): 1 passed, 0 failed"));
    assert!(root.join("out/D90/r.json").exists());
}

#[test]
fn test_any_failure_exits_one() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &[]);
    assert_eq!(out.status.code(), Some(EXIT_FAILED), "{out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("process exit code: 3"));
    assert!(stdout.contains("2 experiment(s): 1 passed, 1 failed"));
    assert!(fs::read_to_string(root.join("logs/crash.log"))
        .unwrap()
        .contains("boom"));
}

#[test]
fn test_unknown_experiment_exits_two_without_running() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &["score", "train-fan"]);
    assert_eq!(out.status.code(), Some(EXIT_CONFIG), "{out:?}");
    assert!(String::from_utf8_lossy(&out.stderr).contains("train-fan"));
    assert!(!root.join("out/D90/r.json").exists());
}

#[test]
fn test_malformed_table_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("broken.json");
    fs::write(&table, "{ not json").unwrap();
    let out = harness(&table, &dir.path().join("root"), &[]);
    assert_eq!(out.status.code(), Some(EXIT_CONFIG), "{out:?}");
}

#[test]
fn test_unsafe_root_exits_two() {
    let (dir, table, _root) = setup();
    let root = dir.path().join("a;touch pwned");
    let out = harness(&table, &root, &["score"]);
    assert_eq!(out.status.code(), Some(EXIT_CONFIG), "{out:?}");
    assert!(!dir.path().join("pwned").exists());
}

// ============================================================================
// Output modes
// ============================================================================

#[test]
fn test_json_report_is_valid() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &["--json"]);
    assert_eq!(out.status.code(), Some(EXIT_FAILED));
    let report: Value = serde_json::from_slice(&out.stdout).expect("stdout must be JSON");
    let experiments = report["experiments"].as_array().unwrap();
    assert_eq!(experiments.len(), 2);
    assert_eq!(experiments[0]["experiment"], "score");
    assert_eq!(experiments[0]["verdict"], "PASS");
    assert_eq!(experiments[1]["verdict"], "FAIL");
    assert_eq!(experiments[1]["exit_code"], 3);
}

#[test]
fn test_list_prints_table_order() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &["--list"]);
    assert_eq!(out.status.code(), Some(EXIT_PASSED));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let score = stdout.find("score").unwrap();
    let crash = stdout.find("crash").unwrap();
    assert!(score < crash);
}

#[test]
fn test_dry_run_executes_nothing() {
    let (_dir, table, root) = setup();
    let out = harness(&table, &root, &["--dry-run", "score"]);
    assert_eq!(out.status.code(), Some(EXIT_PASSED), "{out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(&format!("mkdir -p {}/out/D90", root.display())));
    assert!(!root.join("out").exists());
}

#[test]
fn test_verify_only_uses_earlier_outputs() {
    let (_dir, table, root) = setup();
    assert_eq!(harness(&table, &root, &["score"]).status.code(), Some(EXIT_PASSED));
    fs::remove_file(root.join("logs/score.log")).unwrap();

    let out = harness(&table, &root, &["--verify-only", "score"]);
    assert_eq!(out.status.code(), Some(EXIT_PASSED), "{out:?}");
    assert!(!root.join("logs/score.log").exists());
}
