// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI integration tests against the compiled binary.
//!
//! Each test runs the binary in an isolated temp directory with its own
//! XDG config home, so the local file / env override layers are exercised
//! without touching the host configuration.

use std::process::{Command, Output};

use tempfile::TempDir;

fn run_in(dir: &TempDir, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_forecourt"));
    cmd.args(args)
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"));
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to run forecourt binary")
}

#[test]
fn config_subcommand_round_trips_file_and_env_layers() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("forecourt.toml"),
        r#"
[service]
name = "pitlane"

[gateway]
port = 8400
"#,
    )
    .unwrap();

    let output = run_in(
        &dir,
        &["config"],
        &[("FORECOURT_GATEWAY_PORT", "9123")],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let rendered: toml::Value =
        toml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    // File layer applies, env layer wins over it.
    assert_eq!(
        rendered["service"]["name"].as_str(),
        Some("pitlane")
    );
    assert_eq!(rendered["gateway"]["port"].as_integer(), Some(9123));
    // Untouched keys keep their compiled defaults.
    assert_eq!(
        rendered["dispatch"]["max_transient_retries"].as_integer(),
        Some(3)
    );
}

#[test]
fn unknown_config_key_is_rejected_with_nonzero_exit() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("forecourt.toml"),
        "[gateway]\nprot = 8400\n",
    )
    .unwrap();

    let output = run_in(&dir, &["config"], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("prot"), "stderr: {stderr}");
}

#[test]
fn no_subcommand_points_at_help() {
    let dir = TempDir::new().unwrap();
    let output = run_in(&dir, &[], &[]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--help"));
}
