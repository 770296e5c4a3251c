#![allow(clippy::unwrap_used)]
//! End-to-end tests of the `tolcheck` binary.
//!
//! These tests cover:
//! - `--help` lists the commands
//! - `process` success with JSON summary
//! - `process` on a missing directory (exit 1, `Error:` on stderr)
//! - `config init` writes, then refuses to overwrite without `--force`
//! - `launch` without a browser opener on PATH (exit 1, no bootstrap)

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tolcheck() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tolcheck"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn bench(dir: &Path) {
    fs::write(
        dir.join("PSU_m2V5_R10V_CH1.csv"),
        "Time,Voltage\n0.1,-2.501\n0.2,-2.499\n0.3,-2.500\n",
    )
    .unwrap();
    fs::write(
        dir.join("VT2816A_10V_R10V_1000x.txt"),
        "66.0   VT2816_1_Ch1::CurVoltage    10.001\n\
         66.1   VT2816_1_Ch1::CurVoltage    10.000\n",
    )
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    tolcheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("launch"));
}

#[test]
fn test_process_prints_json_summary() {
    let tmp = TempDir::new().unwrap();
    bench(tmp.path());
    let out_dir = tmp.path().join("out");

    let output = tolcheck()
        .arg("--json")
        .arg("process")
        .arg(tmp.path())
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["total_entries"], 2);
    assert_eq!(summary["unit"], "V");
    assert!(summary["files"]["html_report"].is_string());
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 2);
}

#[test]
fn test_process_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();

    tolcheck()
        .arg("process")
        .arg(tmp.path().join("missing"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: Input directory does not exist",
        ));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();
    bench(tmp.path());

    tolcheck()
        .args(["config", "init"])
        .arg(tmp.path())
        .args(["--tolerance", "0.02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 test configurations"));

    let written = fs::read_to_string(tmp.path().join("test_config.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(config["configurations"][0]["tolerance"], 0.02);

    tolcheck()
        .args(["config", "init"])
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    tolcheck()
        .args(["config", "init"])
        .arg(tmp.path())
        .arg("--force")
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn test_launch_without_browser_opener_exits_1() {
    let tmp = TempDir::new().unwrap();
    let empty_path = TempDir::new().unwrap();

    tolcheck()
        .arg("launch")
        .arg("--workdir")
        .arg(tmp.path())
        .env("PATH", empty_path.path())
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("--no-browser"));

    assert!(!tmp.path().join(".tolcheck-bootstrap").exists());
}
