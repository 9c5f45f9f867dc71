//! CLI tests for forticfg
//!
//! This test suite covers:
//! - Argument parsing and help output
//! - show, diff, plan and simulate against configuration files
//! - JSON output
//! - Settings files
//! - Exit codes for the different failure classes

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;

fn forticfg() -> Command {
    let mut cmd = Command::cargo_bin("forticfg").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("FORTICFG_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Running and candidate fixtures on disk.
fn fixture_files() -> (TestFiles, String, String) {
    let files = TestFiles::new();
    let running = files.write("running.conf", RUNNING);
    let candidate = files.write("candidate.conf", CANDIDATE);
    (
        files,
        running.display().to_string(),
        candidate.display().to_string(),
    )
}

// ============================================================================
// Help and argument errors
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    forticfg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("simulate"));
}

#[test]
fn test_version_flag() {
    forticfg()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_arguments() {
    forticfg().arg("diff").assert().failure();
    forticfg().arg("frobnicate").assert().failure();
}

// ============================================================================
// show
// ============================================================================

#[test]
fn test_show_canonical_text() {
    let (_files, running, _) = fixture_files();
    forticfg()
        .args(["show", &running])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "config system global\n    set hostname fw-edge\n",
        ))
        .stdout(predicate::str::contains("uuid").not())
        .stdout(predicate::str::contains("#config-version").not());
}

#[test]
fn test_show_scope() {
    let (_files, running, _) = fixture_files();
    forticfg()
        .args(["show", &running, "--scope", "system interface/port2"])
        .assert()
        .success()
        .stdout("config system interface\n    edit \"port2\"\n        set status down\n    next\nend\n");
}

#[test]
fn test_show_empty_scope_warns() {
    let (_files, running, _) = fixture_files();
    forticfg()
        .args(["show", &running, "--scope", "system dns"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Nothing configured"));
}

#[test]
fn test_show_checksum() {
    let (_files, running, _) = fixture_files();
    let output = forticfg()
        .args(["show", &running, "--checksum"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let checksum = String::from_utf8(output.stdout).unwrap();
    let checksum = checksum.trim();
    assert_eq!(checksum.len(), 64);
    assert_eq!(checksum, parse_fortios(RUNNING).checksum());
}

#[test]
fn test_show_json() {
    let (_files, running, _) = fixture_files();
    let output = forticfg()
        .args(["--output", "json", "show", &running, "--scope", "firewall policy"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["scope"], "firewall policy");
    assert!(value["config"].is_object());
}

#[test]
fn test_show_syntax_error_exit_code() {
    let files = TestFiles::new();
    let broken = files.write("broken.conf", "config system global\n    set hostname fw\n");
    forticfg()
        .args(["show", &broken.display().to_string()])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("ERROR:"))
        .stderr(predicate::str::contains("never closed"));
}

#[test]
fn test_show_missing_file_exit_code() {
    let files = TestFiles::new();
    let missing = files.path().join("missing.conf");
    forticfg()
        .args(["show", &missing.display().to_string()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Failed to load"));
}

// ============================================================================
// diff
// ============================================================================

#[test]
fn test_diff_summary_and_changes() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["diff", &running, &candidate])
        .assert()
        .success()
        .stdout(predicate::str::contains("entries: 1 added, 1 removed, 2 changed"))
        .stdout(predicate::str::contains("moved: 2 entries"))
        .stdout(predicate::str::contains("move 2 before 1"));
}

#[test]
fn test_diff_exit_code() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["diff", "--exit-code", &running, &candidate])
        .assert()
        .code(1);
    forticfg()
        .args(["diff", "--exit-code", &running, &running])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_diff_text() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["diff", "--text", &running, &candidate])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("--- {}", running)))
        .stdout(predicate::str::contains(format!("+++ {}", candidate)))
        .stdout(predicate::str::contains("+    set hostname fw-edge-2"));
}

#[test]
fn test_diff_json() {
    let (_files, running, candidate) = fixture_files();
    let output = forticfg()
        .args(["--output", "json", "diff", &running, &candidate])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["stats"]["entries_added"], 1);
    assert_eq!(value["stats"]["entries_moved"], 2);
    assert_eq!(value["commands"].as_array().unwrap().len(), 25);
}

// ============================================================================
// plan
// ============================================================================

#[test]
fn test_plan_raw_script() {
    let (_files, running, candidate) = fixture_files();
    let expected = script(&plan(&parse_fortios(RUNNING), &parse_fortios(CANDIDATE)));
    forticfg()
        .args(["plan", "--raw", &running, &candidate])
        .assert()
        .success()
        .stdout(expected);
}

#[test]
fn test_plan_rollback() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["plan", "--raw", "--rollback", &running, &candidate])
        .assert()
        .success()
        .stdout(predicate::str::contains("set hostname fw-edge\n"))
        .stdout(predicate::str::contains("delete \"mail\""))
        .stdout(predicate::str::contains("move 1 before 2"));
}

#[test]
fn test_plan_scope() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["plan", "--raw", "--scope", "system global", &running, &candidate])
        .assert()
        .success()
        .stdout("config system global\n    set hostname fw-edge-2\nend\n");
}

#[test]
fn test_plan_no_changes() {
    let (_files, running, _) = fixture_files();
    forticfg()
        .args(["plan", &running, &running])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_plan_json() {
    let (_files, running, candidate) = fixture_files();
    let output = forticfg()
        .args(["--output", "json", "plan", &running, &candidate])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let commands = value["commands"].as_array().unwrap();
    assert_eq!(commands[0]["verb"], "ENTER_BLOCK");
    assert_eq!(commands[0]["line"], "config system global");
    assert_eq!(commands[1]["path"], serde_json::json!(["system global"]));
    assert_eq!(value["rollback"], false);
}

#[test]
fn test_settings_file_indent() {
    let (files, running, candidate) = fixture_files();
    let settings = files.write("forticfg.toml", "[output]\nindent = 2\n");
    forticfg()
        .args(["-c", &settings.display().to_string()])
        .args(["plan", "--raw", "--scope", "system interface", &running, &candidate])
        .assert()
        .success()
        .stdout("config system interface\n  edit \"port1\"\n    set allowaccess ping https\n  next\nend\n");
}

// ============================================================================
// simulate
// ============================================================================

#[test]
fn test_simulate_success() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["simulate", &running, &candidate])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMMIT SIMULATION"))
        .stdout(predicate::str::contains("Committed 25 command(s)"));
}

#[test]
fn test_simulate_failure_rolls_back() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args(["simulate", "--fail-at", "5", &running, &candidate])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Rollback"))
        .stdout(predicate::str::contains("Device restored"))
        .stderr(predicate::str::contains("command #5"));
}

#[test]
fn test_simulate_failure_json() {
    let (_files, running, candidate) = fixture_files();
    let output = forticfg()
        .args(["--output", "json", "simulate", "--fail-at", "3", &running, &candidate])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "rolled_back");
    assert_eq!(value["device_restored"], true);
    assert_eq!(value["applied"].as_array().unwrap().len(), 3);
}

#[test]
fn test_simulate_transient_rejection_is_retried() {
    let (files, running, candidate) = fixture_files();
    let settings = files.write("fast.toml", "[commit]\nretry_delay_ms = 1\n");
    forticfg()
        .args(["-c", &settings.display().to_string()])
        .args([
            "simulate", "--fail-at", "2", "--code", "-23", "--times", "2", &running, &candidate,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("with 2 retry(ies)"));
}

#[test]
fn test_simulate_timeout() {
    let (_files, running, candidate) = fixture_files();
    forticfg()
        .args([
            "simulate", "--hang-at", "2", "--timeout-ms", "50", &running, &candidate,
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Timed out"));
}

#[test]
fn test_simulate_forced() {
    let (_files, running, candidate) = fixture_files();
    let output = forticfg()
        .args([
            "--output", "json", "simulate", "--force", "--fail-at", "1", &running, &candidate,
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "forced");
    assert_eq!(value["failures"].as_array().unwrap().len(), 1);
}
