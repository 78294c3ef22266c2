//! Integration tests for the `check` and `token` subcommands.
//!
//! These tests run the `cloudcred` binary against a credential file named by
//! `IBM_CREDENTIALS_FILE` and verify that:
//! - `check` reports services whose credentials need no token request
//! - `token` prints a static bearer token and refuses token-less schemes
//! - Invalid or missing credentials exit with an error

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const CREDENTIALS: &str = "\
NLU_AUTH_TYPE=basic
NLU_USERNAME=admin
NLU_PASSWORD=my-password
NLU_URL=https://example.com/nlu
ASSISTANT_AUTH_TYPE=bearerToken
ASSISTANT_BEARER_TOKEN=static-bearer-token
PUBLIC_AUTH_TYPE=noAuth
BROKEN_AUTH_TYPE=basic
BROKEN_USERNAME={apikey}
BROKEN_PASSWORD=my-password
";

/// Run `cloudcred` with a clean environment, a missing config file and the
/// test credential file.
fn cloudcred(dir: &TempDir, args: &[&str]) -> Output {
    let credentials = dir.path().join("ibm-credentials.env");
    std::fs::write(&credentials, CREDENTIALS).unwrap();

    Command::new(env!("CARGO_BIN_EXE_cloudcred"))
        .env_clear()
        .env("IBM_CREDENTIALS_FILE", &credentials)
        .current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("cli.toml"))
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_check_basic_service() {
    let dir = TempDir::new().unwrap();
    let output = cloudcred(&dir, &["check", "nlu"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "nlu: basic authentication ready");
}

#[test]
fn test_check_bearer_and_noauth_services() {
    let dir = TempDir::new().unwrap();

    let output = cloudcred(&dir, &["check", "assistant"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "assistant: bearerToken authentication ready");

    let output = cloudcred(&dir, &["check", "public"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "public: noAuth authentication ready");
}

#[test]
fn test_check_rejects_invalid_credentials() {
    let dir = TempDir::new().unwrap();
    let output = cloudcred(&dir, &["check", "broken"]);

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("Invalid credentials for broken"));
}

#[test]
fn test_check_unknown_service_fails() {
    let dir = TempDir::new().unwrap();
    let output = cloudcred(&dir, &["check", "discovery"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid credentials for discovery"));
}

#[test]
fn test_token_prints_bearer_token() {
    let dir = TempDir::new().unwrap();

    let output = cloudcred(&dir, &["token", "assistant"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "static-bearer-token");

    let output = cloudcred(&dir, &["token", "assistant", "--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["service"], "assistant");
    assert_eq!(value["auth_type"], "bearerToken");
    assert_eq!(value["access_token"], "static-bearer-token");
    assert!(value["expires_at_millis"].is_null());
}

#[test]
fn test_token_refuses_basic_service() {
    let dir = TempDir::new().unwrap();
    let output = cloudcred(&dir, &["token", "nlu"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("basic authentication does not use an access token"));
}

#[test]
fn test_config_file_adds_credential_files() {
    let dir = TempDir::new().unwrap();
    let extra = dir.path().join("extra.env");
    std::fs::write(&extra, "DISCOVERY_AUTH_TYPE=bearerToken\nDISCOVERY_BEARER_TOKEN=from-extra\n").unwrap();
    write_config(dir.path(), &extra);

    let output = cloudcred(&dir, &["token", "discovery"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "from-extra");
}

fn write_config(dir: &Path, credentials: &Path) {
    let config = format!("credential_files = [{:?}]\n", credentials.display().to_string());
    std::fs::write(dir.join("cli.toml"), config).unwrap();
}
