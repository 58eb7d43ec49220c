//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    run_cli_with_input(data_dir, args, "")
}

fn run_cli_with_input(data_dir: &Path, args: &[&str], input: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pomopal"))
        .args(args)
        .env("POMOPAL_DATA_DIR", data_dir)
        .env_remove("POMOPAL_API_KEY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["--help"]);
    assert_eq!(code, 0);
    for sub in ["run", "status", "config", "profile", "completions"] {
        assert!(stdout.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn test_config_get_default() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "timer.focus_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "companion.cooldown_ms", "5000"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "companion.cooldown_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5000");
}

#[test]
fn test_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.cycle_length", "5"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "timer.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_status_json() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["status", "--json"]);
    assert_eq!(code, 0);

    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["state"], "focus_paused");
    assert_eq!(status["time_left_secs"], 1500);
    assert_eq!(status["clock"], "25:00");
    assert_eq!(status["level"], 1);
}

#[test]
fn test_profile_level_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["profile", "set", "api-key", "sk-hidden"]);
    assert_eq!(code, 0);
    let (stdout, _, code) = run_cli(dir.path(), &["profile", "set-level", "3"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "level 3");

    let (stdout, _, code) = run_cli(dir.path(), &["profile", "show", "--json"]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("sk-hidden"));
    let profile: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(profile["level"], 3);
    assert_eq!(profile["maxXpForNextLevel"], 300);

    let (stdout, _, _) = run_cli(dir.path(), &["profile", "show"]);
    assert!(stdout.contains("credential: set"));
}

#[test]
fn test_profile_export() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["profile", "set", "name", "Miso"]);

    let (stdout, _, code) = run_cli(
        dir.path(),
        &["profile", "export", out.path().to_str().unwrap()],
    );
    assert_eq!(code, 0);
    let path = Path::new(stdout.trim());
    assert!(path.exists());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("Miso_"));
}

#[test]
fn test_run_reads_commands_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli_with_input(dir.path(), &["run"], "status\nquit\n");
    assert_eq!(code, 0);
    assert!(stdout.contains("25:00"));
    assert!(stdout.contains("stopped at"));
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pomopal"));
}
