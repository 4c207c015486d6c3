//! Binary-level tests for argument validation and JSON output
//!
//! Every case here fails or succeeds before any request reaches the
//! network, so no S3 server is needed.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn s3tree(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_s3tree"))
        .args(args)
        .env("S3TREE_CONFIG_DIR", config_dir)
        .env_remove("S3TREE_BUCKET")
        .env_remove("S3TREE_PROFILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute s3tree")
}

fn write_config(dir: &TempDir) {
    std::fs::write(
        dir.path().join("config.toml"),
        r#"
[profiles.default]
endpoint = "http://127.0.0.1:9"
region = "us-east-1"
access_key = "test"
secret_key = "test"
path_style = true

[profiles.staging]
endpoint = "http://127.0.0.1:9"
read_only = true
"#,
    )
    .expect("Failed to write config");
}

fn stderr_json(output: &Output) -> serde_json::Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with('{'))
        .expect("stderr should contain a JSON error");
    serde_json::from_str(line).expect("Error should be valid JSON")
}

#[test]
fn test_profiles_json() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let output = s3tree(dir.path(), &["profiles", "--json"]);
    assert!(output.status.success(), "Command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("Output should be valid JSON");
    insta::assert_json_snapshot!(json, @r#"
    {
      "profiles": [
        "default",
        "staging"
      ]
    }
    "#);
}

#[test]
fn test_profiles_without_config_is_empty() {
    let dir = TempDir::new().unwrap();

    let output = s3tree(dir.path(), &["profiles"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_rm_whole_bucket_requires_force() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let output = s3tree(dir.path(), &["--bucket", "photos", "rm", "/", "--json"]);
    assert_eq!(output.status.code(), Some(2), "Exit code should be 2 (usage)");

    let json = stderr_json(&output);
    insta::assert_json_snapshot!(json, @r#"
    {
      "error": "Remove failed: force required: use --force to operate on the whole bucket"
    }
    "#);
}

#[test]
fn test_ls_requires_bucket() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let output = s3tree(dir.path(), &["ls", "--json"]);
    assert_eq!(output.status.code(), Some(2));

    let json = stderr_json(&output);
    assert_eq!(
        json["error"],
        "Listing failed: Configuration error: missing bucket name"
    );
}

#[test]
fn test_cleanup_requires_a_target() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let output = s3tree(dir.path(), &["-b", "photos", "cleanup", "--force"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unknown_profile() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let output = s3tree(
        dir.path(),
        &["--profile", "prod", "-b", "photos", "ls", "--json"],
    );
    assert_eq!(output.status.code(), Some(2));
    let json = stderr_json(&output);
    assert!(
        json["error"]
            .as_str()
            .is_some_and(|e| e.contains("profile 'prod' not found"))
    );
}
