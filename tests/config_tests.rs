//! Configuration loading tests

use cfgsnap::config::{load_config, ConfigError};
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("cfgsnap.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[global]
data_dir = "/var/lib/cfgsnap"
connect_timeout_seconds = 30
command_timeout_seconds = 120
stale_after_hours = 48

[scheduler]
enabled = true
cron = "0 2 * * *"
max_workers = 8

[[sources]]
type = "static"
[[sources.config.devices]]
name = "core-sw1"
host = "10.0.0.1"
device_type = "cisco_ios"
username = "backup"

[[sinks]]
type = "filesystem"
[sinks.config]
path = "/var/backups/network"
retention = 5
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.global.connect_timeout_seconds, 30);
    assert_eq!(config.global.stale_after_hours, 48);
    assert_eq!(config.scheduler.max_workers, 8);
    assert_eq!(config.scheduler.cron.as_deref(), Some("0 2 * * *"));
    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].type_name, "static");
    assert_eq!(config.sinks.len(), 1);
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError(_)));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[scheduler\nenabled = true");
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_invalid_cron_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[scheduler]\ncron = \"every day at noon\"");
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_empty_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");
    let config = load_config(&path).unwrap();
    assert!(config.scheduler.enabled);
    assert_eq!(config.scheduler.max_workers, 4);
    assert_eq!(config.global.connect_timeout_seconds, 60);
    assert_eq!(config.global.command_timeout_seconds, 90);
}
