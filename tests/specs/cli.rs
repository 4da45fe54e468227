// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI argument and startup-error specs.

use assert_cmd::Command;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

fn twitcher() -> Command {
    let mut cmd = Command::cargo_bin("twitcher").unwrap();
    cmd.timeout(Duration::from_secs(5));
    cmd
}

#[test]
fn version_flag_prints_version_and_exits_zero() {
    let output = twitcher().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("twitcher"));
}

#[test]
fn missing_required_flags_exits_nonzero_with_usage() {
    let output = twitcher().output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn zkservers_without_config_path_exits_nonzero() {
    let output = twitcher().args(["--zkservers", "zk1:2181"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config-path"));
}

#[test]
fn unreadable_config_path_exits_nonzero_before_dialing_zookeeper() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");

    // An unreachable `--zkservers` address would otherwise make this test
    // hang on a connection retry; the config-directory check runs first
    // precisely so this case fails fast (see crates/cli/src/main.rs).
    let output = twitcher()
        .args(["--zkservers", "127.0.0.1:1", "--config-path"])
        .arg(&missing)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unable to read config directory"));
}

#[test]
fn unknown_flag_is_rejected() {
    let output = twitcher().arg("--bogus-flag").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn config_path_pointing_at_a_plain_file_is_rejected() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("not-a-directory");
    fs::write(&file, "hello").unwrap();

    let output = twitcher()
        .args(["--zkservers", "127.0.0.1:1", "--config-path"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(!output.status.success());
}
