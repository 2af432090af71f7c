//! End-to-end tests that drive the `ramp-dispatch` binary.

use std::path::PathBuf;
use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    match Command::new(env!("CARGO_BIN_EXE_ramp-dispatch")).args(args).output() {
        Ok(output) => output,
        Err(e) => panic!("ramp-dispatch process should run: {e}"),
    }
}

fn report_value(stdout: &str, label: &str) -> Option<String> {
    stdout
        .lines()
        .find(|l| l.starts_with(label))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim().to_string())
}

#[test]
fn every_preset_runs_without_ramp_violations() {
    for preset in ["baseline", "delayed", "midpoint", "regulation"] {
        let output = run(&["--preset", preset]);
        assert!(
            output.status.success(),
            "preset {preset} failed: stderr={}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("--- Trajectory Report ---"));
        assert_eq!(
            report_value(&stdout, "Ramp violations").as_deref(),
            Some("0"),
            "preset {preset}"
        );
    }
}

#[test]
fn scenario_file_and_telemetry_export() {
    let path: PathBuf = std::env::temp_dir().join(format!(
        "ramp-dispatch-telemetry-{}.csv",
        std::process::id()
    ));
    let path_str = path.to_string_lossy().to_string();
    let output = run(&[
        "--scenario",
        "scenarios/baseline.toml",
        "--telemetry-out",
        &path_str,
    ]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let csv = std::fs::read_to_string(&path).unwrap_or_default();
    std::fs::remove_file(&path).ok();
    let lines: Vec<&str> = csv.lines().collect();
    // 1 header + 120 steps
    assert_eq!(lines.len(), 121);
    assert!(lines[0].starts_with("step,time_s,"));
}

#[test]
fn unknown_preset_fails_cleanly() {
    let output = run(&["--preset", "nonexistent"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"));
}

#[test]
fn invalid_seed_is_rejected() {
    let output = run(&["--seed", "minus-one"]);
    assert!(!output.status.success());
}
