//! CLI integration tests

use std::process::Command;

fn allocctl(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_allocctl"))
        .args(args)
        .output()
        .expect("Failed to execute allocctl")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = allocctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Cluster Allocation"), "Should show app name");
    assert!(stdout.contains("snapshot"), "Should show snapshot command");
    assert!(stdout.contains("samples"), "Should show samples command");
    assert!(stdout.contains("--kubeconfig"), "Should show kubeconfig option");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = allocctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("allocctl"), "Should show binary name");
}

/// Test snapshot subcommand help
#[test]
fn test_snapshot_help() {
    let output = allocctl(&["snapshot", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Snapshot help should succeed");
    assert!(stdout.contains("--selector"), "Should show selector option");
    assert!(
        stdout.contains("--ignore-node-status"),
        "Should show ignore-node-status option"
    );
    assert!(stdout.contains("--no-groups"), "Should show no-groups option");
    assert!(stdout.contains("--nodes"), "Should show nodes option");
}

/// Test samples subcommand help
#[test]
fn test_samples_help() {
    let output = allocctl(&["samples", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Samples help should succeed");
    assert!(stdout.contains("--tenant-label"), "Should show tenant-label option");
    assert!(stdout.contains("--prefix"), "Should show prefix option");
}

/// Test that an unknown output format is rejected
#[test]
fn test_invalid_format_rejected() {
    let output = allocctl(&["--format", "yaml", "snapshot"]);
    assert!(!output.status.success(), "Unknown format should fail");
}

/// Test that a missing subcommand is rejected
#[test]
fn test_missing_subcommand() {
    let output = allocctl(&[]);
    assert!(!output.status.success(), "Missing subcommand should fail");
}
