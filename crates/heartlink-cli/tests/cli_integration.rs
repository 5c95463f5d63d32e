//! CLI Integration Tests
//!
//! These tests run the `heartlink` binary. The watch test needs a Bluetooth
//! adapter and a peripheral in range and is marked with #[ignore]:
//! ```
//! HEARTLINK_TARGET="BLEScanner" cargo test --package heartlink-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::process::{Command, Output};

fn run_heartlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_heartlink"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run heartlink binary")
}

#[test]
fn test_help_command() {
    let output = run_heartlink(&["--help"]);
    assert!(output.status.success(), "Help should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("watch"), "Help should list watch command");
    assert!(stdout.contains("config"), "Help should list config command");
    assert!(
        stdout.contains("completions"),
        "Help should list completions command"
    );
}

#[test]
fn test_version_command() {
    let output = run_heartlink(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("heartlink"));
}

#[test]
fn test_watch_help_lists_options() {
    let output = run_heartlink(&["watch", "--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--target", "--decoder", "--json", "--count"] {
        assert!(stdout.contains(flag), "watch help should list {}", flag);
    }
}

#[test]
fn test_config_path() {
    let output = run_heartlink(&["config", "path"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config.toml"));
}

#[test]
fn test_completions_bash() {
    let output = run_heartlink(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("heartlink"));
}

#[test]
fn test_invalid_decoder_fails() {
    let output = run_heartlink(&["watch", "--decoder", "fancy"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("fancy"));
}

#[test]
fn test_zero_count_fails() {
    let output = run_heartlink(&["watch", "--count", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--count"));
}

#[test]
#[ignore = "requires BLE hardware"]
fn test_watch_one_reading() {
    let output = run_heartlink(&["watch", "--count", "1", "--json"]);
    assert!(
        output.status.success(),
        "watch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("no output");
    let value: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(value["type"], "reading");
}
