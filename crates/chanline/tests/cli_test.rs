//! Integration tests for the `chanline` CLI binary.
//!
//! Argument parsing, config handling, catalog output and error exit codes,
//! all without a transcode engine or network access.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

const NOWHERE: &str = "/tmp/chanline-cli-test-nonexistent";

/// Build a [`Command`] for the `chanline` binary with env isolation.
///
/// Points every platform directory at a nonexistent path so tests never
/// touch the user's real configuration or state cache.
fn chanline_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("chanline");
    cmd.env("HOME", NOWHERE)
        .env("XDG_CONFIG_HOME", NOWHERE)
        .env("XDG_DATA_HOME", NOWHERE)
        .env("XDG_CACHE_HOME", NOWHERE)
        .env("NO_COLOR", "1")
        .env_remove("CHANLINE_CONFIG")
        .env_remove("CHANLINE_OUTPUT")
        .env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("CHANLINE_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const CATALOG: &str = r#"
[[channels]]
id = "news"
name = "News 24"
url = "https://example.com/news/index.m3u8"
quality = "HD"
category = "News"

[[channels]]
id = "arena"
name = "Arena Sports"
url = "https://example.com/arena/index.m3u8"
quality = "4K"
category = "Sports"
"#;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn with_config(path: &Path) -> assert_cmd::Command {
    let mut cmd = chanline_cmd();
    cmd.arg("--config").arg(path);
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = chanline_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    chanline_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("IPTV")
            .and(predicate::str::contains("play"))
            .and(predicate::str::contains("probe"))
            .and(predicate::str::contains("proxy")),
    );
}

#[test]
fn test_version_flag() {
    chanline_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chanline"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    chanline_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    chanline_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument errors ─────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = chanline_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    chanline_cmd()
        .args(["channels", "list", "-o", "xml"])
        .assert()
        .code(2);
}

#[test]
fn test_password_env_requires_username() {
    chanline_cmd()
        .args(["proxy", "test", "proxy.lan", "--password-env", "PW"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_without_file_uses_defaults() {
    chanline_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[telemetry]").and(predicate::str::contains("ffmpeg")));
}

#[test]
fn test_config_path_survives_broken_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "this is = = not toml");
    with_config(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_broken_config_fails_other_commands() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "this is = = not toml");
    let output = with_config(&path).args(["channels", "list"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_config_set_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    with_config(&path)
        .args(["config", "set", "quality.default", "HD"])
        .assert()
        .success();

    let output = with_config(&path)
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let cfg: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(cfg["quality"]["default"], "HD");
}

#[test]
fn test_config_set_unknown_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let output = with_config(&path)
        .args(["config", "set", "engine.turbo", "on"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("unknown config key"));
    assert!(!path.exists(), "rejected set must not write the file");
}

#[test]
fn test_config_set_bad_quality() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    with_config(&path)
        .args(["config", "set", "quality.default", "8K"])
        .assert()
        .code(2);
}

// ── Channels ────────────────────────────────────────────────────────

#[test]
fn test_channels_list_table() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG);
    with_config(&path)
        .args(["channels", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("News 24")
                .and(predicate::str::contains("Arena Sports"))
                .and(predicate::str::contains("4K")),
        );
}

#[test]
fn test_channels_list_json_filtered() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG);
    let output = with_config(&path)
        .args(["channels", "list", "-c", "sports", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], "arena");
    assert_eq!(list[0]["nominal_quality"], "4K");
}

#[test]
fn test_channels_list_plain() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG);
    with_config(&path)
        .args(["channels", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("news\narena\n");
}

#[test]
fn test_channel_with_bad_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[[channels]]
id = "broken"
name = "Broken"
url = "not a url"
"#,
    );
    let output = with_config(&path).args(["channels", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Play ────────────────────────────────────────────────────────────

#[test]
fn test_play_unknown_channel() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG);
    let output = with_config(&path)
        .args(["play", "weather", "--no-cache"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("channels list"));
}

#[test]
fn test_play_bad_quality() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CATALOG);
    with_config(&path)
        .args(["play", "news", "-Q", "8K", "--no-cache"])
        .assert()
        .code(2);
}

#[test]
fn test_play_without_engine_fails() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        r#"
[engine]
ffmpeg = "{missing}"
device_query = ""
output_dir = "{out}"

[telemetry]
latency_url = "http://127.0.0.1:9/"
download_url = "http://127.0.0.1:9/"
measure_timeout_secs = 2

[session]
retry_attempts = 1
retry_base_ms = 10
{CATALOG}"#,
        missing = dir.path().join("no-such-ffmpeg").display(),
        out = dir.path().join("streams").display(),
    );
    let path = write_config(&dir, &body);
    let output = with_config(&path)
        .args(["play", "news", "-d", "20s", "--no-cache"])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(4),
        "Expected engine failure:\n{}",
        combined_output(&output)
    );
    assert!(combined_output(&output).contains("News 24"));
}

// ── Proxy ───────────────────────────────────────────────────────────

#[test]
fn test_proxy_show_unconfigured() {
    chanline_cmd()
        .args(["proxy", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No proxy configured"));
}

#[test]
fn test_proxy_clear_requires_yes() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[proxy]
enabled = false
host = "proxy.lan"
"#,
    );
    let output = with_config(&path)
        .args(["proxy", "clear"])
        .write_stdin("")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[test]
fn test_proxy_test_unsupported_port() {
    chanline_cmd()
        .args(["proxy", "test", "proxy.lan", "-P", "70000", "--no-cache"])
        .assert()
        .code(2);
}

#[test]
fn test_proxy_test_socks_scheme_is_rejected() {
    let output = chanline_cmd()
        .args(["proxy", "test", "proxy.lan", "--scheme", "socks5", "--no-cache"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("socks5 proxies"));
}
