//! Integration tests for the `panelsync` binary.
//!
//! Only the fail-fast startup path is exercised: a valid configuration
//! runs until interrupted.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `panelsync` binary with env isolation.
///
/// Clears the credential variables and points the config file at `config`
/// so tests never touch the user's real configuration.
fn panelsync_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("panelsync");
    cmd.env("PANELSYNC_CONFIG", config)
        .env("HOME", "/tmp/panelsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/panelsync-cli-test-nonexistent")
        .env("RUST_LOG", "warn")
        .env_remove("NANOLEAF_BASE_URL")
        .env_remove("NANOLEAF_AUTH_TOKEN");
    cmd
}

/// Write `contents` to a per-test file under the system temp dir.
fn config_file(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("panelsync-cli-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}.toml"));
    std::fs::write(&path, contents).unwrap();
    path
}

const VALID_FEED: &str = r#"
[feed]
url = "http://127.0.0.1:9/counters"

[[entities]]
id = "oauth2"
panel_id = 51890
"#;

// ── Fail-fast startup ───────────────────────────────────────────────

#[test]
fn test_missing_config_file_reports_first_missing_setting() {
    let path = std::env::temp_dir().join("panelsync-cli-test-absent.toml");

    panelsync_cmd(&path)
        .assert()
        .failure()
        .code(2)
        .stderr(
            predicate::str::contains("Missing required setting feed.url")
                .and(predicate::str::contains("PANELSYNC_FEED__URL")),
        );
}

#[test]
fn test_missing_token_names_env_var() {
    let path = config_file("missing-token", VALID_FEED);

    panelsync_cmd(&path)
        .env("NANOLEAF_BASE_URL", "http://127.0.0.1:16021")
        .assert()
        .failure()
        .code(2)
        .stderr(
            predicate::str::contains("device.auth_token")
                .and(predicate::str::contains("NANOLEAF_AUTH_TOKEN")),
        );
}

#[test]
fn test_non_http_device_url_is_rejected() {
    let path = config_file("bad-scheme", VALID_FEED);

    panelsync_cmd(&path)
        .env("NANOLEAF_BASE_URL", "ftp://127.0.0.1")
        .env("NANOLEAF_AUTH_TOKEN", "token")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid value for device.base_url"));
}

#[test]
fn test_duplicate_entities_are_rejected() {
    let path = config_file(
        "duplicate-entities",
        r#"
[feed]
url = "http://127.0.0.1:9/counters"

[[entities]]
id = "oauth2"
panel_id = 1

[[entities]]
id = "oauth2"
panel_id = 2
"#,
    );

    panelsync_cmd(&path)
        .env("NANOLEAF_BASE_URL", "http://127.0.0.1:16021")
        .env("NANOLEAF_AUTH_TOKEN", "token")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("duplicate entity id 'oauth2'"));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let path = config_file("malformed", "[feed\nurl = ");

    panelsync_cmd(&path).assert().failure().code(2);
}
