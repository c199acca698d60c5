//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. Each test
//! observes the effective settings through `plan --json`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// A command with no step inputs or runner variables from the host.
fn isolated(logs: &Path) -> Command {
    let mut cmd = cmd();
    for (key, _) in std::env::vars() {
        if key.starts_with("INPUT_") || key.starts_with("GITHUB_") {
            cmd.env_remove(key);
        }
    }
    for key in ["CI", "CURRENT_TAG", "PACKAGEJSON_DIR", "RUST_LOG"] {
        cmd.env_remove(key);
    }
    cmd.env("TAGBUMP_LOG_DIR", logs);
    cmd
}

/// A repository root (`.git` marker) with a package.json at 1.0.0.
fn repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    fs::write(tmp.path().join("package.json"), r#"{"version": "1.0.0"}"#).unwrap();
    tmp
}

/// Run `plan --json` in `dir` for `message` and return the tag it would create.
fn planned_tag(cmd: &mut Command, dir: &Path, message: &str) -> Option<String> {
    let output = cmd
        .args(["-C", dir.to_str().unwrap(), "--json", "plan", "-m", message])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.get_output().stdout)).unwrap();
    json["tag"].as_str().map(String::from)
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = repo();
    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("1.1.0"));
}

#[test]
fn discovers_dotfile_config() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.toml"), r#"tag_prefix = "v""#).unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("v1.1.0"));
}

#[test]
fn discovers_regular_config() {
    let tmp = repo();
    fs::write(tmp.path().join("tagbump.toml"), r#"tag_prefix = "release-""#).unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("release-1.1.0"));
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.toml"), r#"tag_prefix = "dot-""#).unwrap();
    fs::write(tmp.path().join("tagbump.toml"), r#"tag_prefix = "plain-""#).unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("dot-1.1.0"));
}

#[test]
fn explicit_config_file_is_used() {
    let tmp = repo();
    let config = tmp.path().join("release.yaml");
    fs::write(&config, "tag_prefix: x\n").unwrap();

    let mut command = isolated(tmp.path());
    command.args(["--config", config.to_str().unwrap()]);
    let tag = planned_tag(&mut command, tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("x1.1.0"));
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_wordings() {
    let tmp = repo();
    fs::write(
        tmp.path().join(".tagbump.yaml"),
        "minor_wording:\n  - feat\n  - feature\n",
    )
    .unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "feat: login");
    assert_eq!(tag.as_deref(), Some("1.1.0"));
}

#[test]
fn parses_json_comma_separated_wordings() {
    let tmp = repo();
    fs::write(
        tmp.path().join(".tagbump.json"),
        r#"{"patch_wording": "fix,perf"}"#,
    )
    .unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "perf: cache");
    assert_eq!(tag.as_deref(), Some("1.0.1"));
}

#[test]
fn custom_commit_message_changes_bump_guard() {
    let tmp = repo();
    fs::write(
        tmp.path().join(".tagbump.toml"),
        r#"commit_message = "release {{version}} [skip ci]""#,
    )
    .unwrap();

    // The default bump message is no longer recognised...
    let tag = planned_tag(
        &mut isolated(tmp.path()),
        tmp.path(),
        "ci: version bump to 1.0.0\nminor",
    );
    assert_eq!(tag.as_deref(), Some("1.1.0"));

    // ...but the configured one is.
    let tag = planned_tag(
        &mut isolated(tmp.path()),
        tmp.path(),
        "release 1.0.0 [skip ci]\nminor",
    );
    assert_eq!(tag, None);
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = repo();
    fs::write(
        tmp.path().join(".tagbump.toml"),
        r#"
log_level = "info"
unknown_field = "should be ignored"
"#,
    )
    .unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("1.1.0"));
}

// =============================================================================
// Step Inputs
// =============================================================================

#[test]
fn step_input_overrides_config_file() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.toml"), r#"tag_prefix = "file-""#).unwrap();

    let mut command = isolated(tmp.path());
    command.env("INPUT_TAG-PREFIX", "env-");
    let tag = planned_tag(&mut command, tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("env-1.1.0"));
}

#[test]
fn empty_step_input_keeps_config_value() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.toml"), r#"tag_prefix = "v""#).unwrap();

    let mut command = isolated(tmp.path());
    command.env("INPUT_TAG-PREFIX", "");
    let tag = planned_tag(&mut command, tmp.path(), "minor");
    assert_eq!(tag.as_deref(), Some("v1.1.0"));
}

#[test]
fn numeric_step_inputs_are_text() {
    let tmp = repo();
    let mut command = isolated(tmp.path());
    command.env("INPUT_TAG-PREFIX", "7");
    command.env("INPUT_PATCH-WORDING", "1");
    let tag = planned_tag(&mut command, tmp.path(), "bump 1");
    assert_eq!(tag.as_deref(), Some("71.0.1"));
}

#[test]
fn version_type_input_bypasses_keywords() {
    let tmp = repo();
    let mut command = isolated(tmp.path());
    command.env("INPUT_VERSION-TYPE", "major");
    let tag = planned_tag(&mut command, tmp.path(), "docs: nothing to see");
    assert_eq!(tag.as_deref(), Some("2.0.0"));
}

#[test]
fn flag_overrides_step_input() {
    let tmp = repo();
    let mut command = isolated(tmp.path());
    command.env("INPUT_TAG-PREFIX", "env-");
    let output = command
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "plan"])
        .args(["--tag-prefix", "flag-", "-m", "minor"])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.get_output().stdout)).unwrap();
    assert_eq!(json["tag"], "flag-1.1.0");
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.toml"), "this is not valid toml [[[").unwrap();

    isolated(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "plan"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = repo();
    fs::write(tmp.path().join(".tagbump.json"), "{not valid json}").unwrap();

    isolated(tmp.path())
        .args(["-C", tmp.path().to_str().unwrap(), "plan"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_version_type_input_fails() {
    let tmp = repo();
    isolated(tmp.path())
        .env("INPUT_VERSION-TYPE", "rc")
        .args(["-C", tmp.path().to_str().unwrap(), "plan"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid release type"));
}

// =============================================================================
// Boundary Marker Tests
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();
    fs::write(repo.join("package.json"), r#"{"version": "1.0.0"}"#).unwrap();

    // Config outside the repository must not be picked up.
    fs::write(parent.join(".tagbump.toml"), r#"tag_prefix = "outside-""#).unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), &repo, "minor");
    assert_eq!(tag.as_deref(), Some("1.1.0"));
}

#[test]
fn config_at_repository_root_found_from_subdirectory() {
    let tmp = repo();
    let pkg = tmp.path().join("packages").join("web");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("package.json"), r#"{"version": "0.3.0"}"#).unwrap();
    fs::write(tmp.path().join(".tagbump.toml"), r#"tag_prefix = "web-v""#).unwrap();

    let tag = planned_tag(&mut isolated(tmp.path()), &pkg, "minor");
    assert_eq!(tag.as_deref(), Some("web-v0.4.0"));
}
