//! Integration tests for Settings loading with layered precedence.
//!
//! Environment overrides live in `config_env_test.rs`, which runs as its own
//! binary so the process environment stays untouched here.

use std::fs;

use tempfile::TempDir;

use tagbind::config::{InvariantPolicy, Settings};
use tagbind::BindError;

#[test]
fn given_no_file_when_load_then_defaults() {
    let settings = Settings::load(None).expect("load settings");

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_missing_file_when_load_then_defaults() {
    let dir = TempDir::new().unwrap();

    let settings = Settings::load(Some(&dir.path().join("absent.toml"))).expect("load settings");

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_partial_file_when_load_then_overlays_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tagbind.toml");
    fs::write(&path, "self_heal = false\n").unwrap();

    // Act
    let settings = Settings::load(Some(&path)).expect("load settings");

    // Assert
    assert!(!settings.self_heal);
    assert_eq!(settings.invariant_policy, InvariantPolicy::Log);
}

#[test]
fn given_full_file_when_load_then_all_values_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tagbind.toml");
    fs::write(
        &path,
        r#"
invariant_policy = "panic"
self_heal = true
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(settings.invariant_policy, InvariantPolicy::Panic);
    assert!(settings.self_heal);
}

#[test]
fn given_malformed_file_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tagbind.toml");
    fs::write(&path, "self_heal = \"sometimes\"\n").unwrap();

    let err = Settings::load(Some(&path)).unwrap_err();

    assert!(matches!(err, BindError::Config { .. }));
    assert!(err.to_string().contains("tagbind.toml"));
}
