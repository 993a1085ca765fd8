#![cfg(test)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use crate::config::{AppConfig, ConfigError, ConfigFormat, FailurePolicy, StartOrder};
use crate::kernel::constants::{APP_NAME, DEFAULT_MANIFEST_FILE};

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert_eq!(config.name, APP_NAME);
    assert_eq!(config.base_paths, vec![PathBuf::from(".")]);
    assert_eq!(config.directories, vec!["plugins".to_string()]);
    assert_eq!(config.manifest_file, DEFAULT_MANIFEST_FILE);
    assert_eq!(config.failure_policy, FailurePolicy::Skip);
    assert_eq!(config.start_order, StartOrder::Priority);
}

#[test]
fn test_format_from_path() {
    assert_eq!(ConfigFormat::from_path(Path::new("keel.json")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("KEEL.JSON")), Some(ConfigFormat::Json));
    assert_eq!(ConfigFormat::from_path(Path::new("keel.yml")), Some(ConfigFormat::Yaml));
    assert_eq!(ConfigFormat::from_path(Path::new("keel.toml")), Some(ConfigFormat::Toml));
    assert_eq!(ConfigFormat::from_path(Path::new("keel.ini")), None);
    assert_eq!(ConfigFormat::from_path(Path::new("keel")), None);
}

#[test]
fn test_missing_keys_take_defaults() {
    let config = AppConfig::from_text(r#"{"failure_policy": "abort"}"#, ConfigFormat::Json).unwrap();
    assert_eq!(config.failure_policy, FailurePolicy::Abort);
    assert_eq!(config.directories, AppConfig::default().directories);
}

#[test]
fn test_yaml_and_toml_configs() {
    let yaml = "base_paths: [/opt/app, /srv/app]\nstart_order: registration\n";
    let config = AppConfig::from_text(yaml, ConfigFormat::Yaml).unwrap();
    assert_eq!(config.base_paths.len(), 2);
    assert_eq!(config.start_order, StartOrder::Registration);

    let toml = "name = \"host\"\ndirectories = [\"plugins\", \"node_modules\"]\n";
    let config = AppConfig::from_text(toml, ConfigFormat::Toml).unwrap();
    assert_eq!(config.name, "host");
    assert_eq!(config.directories, vec!["plugins".to_string(), "node_modules".to_string()]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = AppConfig::from_text(r#"{"directories": []}"#, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("directories")));

    let err = AppConfig::from_text(r#"{"failure_policy": "panic"}"#, ConfigFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { format: ConfigFormat::Json, .. }));
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keel.yaml");
    fs::write(&path, "failure_policy: abort\nmanifest_file: package.json\n").unwrap();

    let config = AppConfig::load(&path).await.unwrap();
    assert_eq!(config.failure_policy, FailurePolicy::Abort);
    assert_eq!(config.manifest_file, "package.json");
}

#[tokio::test]
async fn test_load_errors() {
    let dir = tempdir().unwrap();

    let missing = dir.path().join("absent.json");
    assert!(matches!(AppConfig::load(&missing).await, Err(ConfigError::Io { .. })));

    let unsupported = dir.path().join("keel.conf");
    fs::write(&unsupported, "").unwrap();
    assert!(matches!(
        AppConfig::load(&unsupported).await,
        Err(ConfigError::UnsupportedFormat(_))
    ));
}
