//! Integration tests for the `emberlink` CLI binary.
//!
//! These tests drive full sessions against a tree snapshot written to a
//! temp directory, and never touch the user's real configuration.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const TREE: &str = r##"{
    "address": "studio-mixer:9000",
    "nodes": [
        { "number": 1, "identifier": "Audio", "children": [
            { "number": 1, "identifier": "Gain", "type": "integer", "value": -120,
              "minimum": -640, "maximum": 60, "factor": 10 },
            { "number": 2, "identifier": "Mode", "type": "enum", "value": 1,
              "enumeration": "Off\nOn\nAuto" },
            { "number": 3, "identifier": "Mute", "type": "boolean", "value": false }
        ]},
        { "number": 2, "identifier": "#Video", "children": [
            { "number": 1, "identifier": "Source", "type": "string", "value": "Cam1" }
        ]}
    ]
}"##;

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tree.json"), TREE).unwrap();
        Self { dir }
    }

    fn tree(&self) -> PathBuf {
        self.dir.path().join("tree.json")
    }

    fn home(&self) -> &Path {
        self.dir.path()
    }

    /// Build a [`Command`] for the `emberlink` binary with env isolation.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("emberlink");
        cmd.env("HOME", self.home())
            .env("XDG_CONFIG_HOME", self.home().join("config"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("EMBERLINK_PROFILE")
            .env_remove("EMBERLINK_TREE")
            .env_remove("EMBERLINK_HOST")
            .env_remove("EMBERLINK_PORT")
            .env_remove("EMBERLINK_TIMEOUT")
            .env_remove("EMBERLINK_OUTPUT");
        cmd
    }

    /// Like [`cmd`](Self::cmd) with `--tree` pointing at the snapshot.
    fn with_tree(&self) -> assert_cmd::Command {
        let mut cmd = self.cmd();
        cmd.arg("--tree").arg(self.tree());
        cmd
    }
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox.cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("crawl")
            .and(predicate::str::contains("toggle"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_completions_zsh() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Crawl and read ──────────────────────────────────────────────────

#[test]
fn test_crawl_lists_labels_and_values() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .with_tree()
        .args(["crawl", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["label"], "Audio.Gain");
    assert_eq!(entries[0]["path"], "1.1");
    assert_eq!(entries[0]["value"], "-12");
    assert_eq!(entries[3]["label"], "Video.Source");
}

#[test]
fn test_crawl_with_parameter_filter() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["crawl", "-o", "plain", "--parameter-filters", "Mode,Source"])
        .assert()
        .success()
        .stdout("Audio.Mode\nVideo.Source\n");
}

#[test]
fn test_crawl_rejects_bad_auto_parse_path() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["crawl", "--auto-parse-paths", "audio"])
        .assert()
        .code(2);
}

#[test]
fn test_get_decodes_enumeration() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["get", "Audio.Mode", "-o", "plain"])
        .assert()
        .success()
        .stdout("On\n");
}

#[test]
fn test_get_unknown_label_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["get", "Audio.Nope"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not found"));
}

// ── Writes ──────────────────────────────────────────────────────────

#[test]
fn test_set_clamps_to_maximum() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["set", "1.1", "500", "-o", "plain"])
        .assert()
        .success()
        .stdout("60\n");
}

#[test]
fn test_set_by_label_with_negative_value() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["set", "Audio.Gain", "-9000", "-o", "plain"])
        .assert()
        .success()
        .stdout("-640\n");
}

#[test]
fn test_set_kind_mismatch_is_reported() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["set", "1.1", "on", "--kind", "boolean"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not issued"));
}

#[test]
fn test_set_unknown_path_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["set", "9.9", "1"])
        .assert()
        .code(4);
}

#[test]
fn test_toggle_by_label() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["toggle", "Audio.Mute", "-o", "plain"])
        .assert()
        .success()
        .stdout("true\n");
}

#[test]
fn test_inc_stops_at_maximum() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["inc", "1.1", "--delta", "1000", "-o", "plain"])
        .assert()
        .success()
        .stdout("60\n");
}

#[test]
fn test_dec_moves_by_delta() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["dec", "1.1", "--delta", "5", "-o", "plain"])
        .assert()
        .success()
        .stdout("-125\n");
}

#[test]
fn test_expr_resolves_variables() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["expr", "1.1", "$(level)", "--var", "level=25", "-o", "plain"])
        .assert()
        .success()
        .stdout("25\n");
}

#[test]
fn test_expr_without_maximum_is_skipped() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["expr", "1.2", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not issued"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_missing_tree_is_a_config_error() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("crawl")
        .assert()
        .code(9)
        .stderr(predicate::str::contains("No provider tree"));
}

#[test]
fn test_unknown_profile_is_a_config_error() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["crawl", "--profile", "nope"])
        .assert()
        .code(9);
}

#[test]
fn test_config_init_then_crawl_from_profile() {
    let sandbox = Sandbox::new();
    sandbox
        .with_tree()
        .args(["config", "init", "--name", "studio", "--node-filters", "Video"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[profiles.studio]"));

    // No --tree: the profile provides it.
    sandbox
        .cmd()
        .args(["crawl", "-o", "plain"])
        .assert()
        .success()
        .stdout("Video.Source\n");
}

#[test]
fn test_config_path_is_under_config_home() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().args(["config", "path"]).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.trim_end().ends_with("config.toml"), "unexpected path: {text}");
}
