use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Inventory sources, queried in order on every run
    #[serde(default)]
    pub sources: Vec<CapabilitySpec>,

    /// Storage sinks, written in order for every device
    #[serde(default)]
    pub sinks: Vec<CapabilitySpec>,
}

/// Global settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Directory for the device cache and lock files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Session connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Per-command execution timeout
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,

    /// Devices not seen by any inventory source within this window are
    /// swept from the cache
    #[serde(default = "default_stale_after")]
    pub stale_after_hours: u64,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            connect_timeout_seconds: default_connect_timeout(),
            command_timeout_seconds: default_command_timeout(),
            stale_after_hours: default_stale_after(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// Recurring trigger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Whether the recurring trigger is armed at startup
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cron expression (5-field); absent means no recurring trigger
    #[serde(default)]
    pub cron: Option<String>,

    /// Maximum concurrent device backups per run
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cron: None,
            max_workers: default_max_workers(),
        }
    }
}

/// One configured capability: a `type` name resolved through the registry
/// plus an opaque configuration table handed to its constructor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilitySpec {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default = "empty_table")]
    pub config: toml::Value,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

// Default value functions

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_connect_timeout() -> u64 {
    60
}
fn default_command_timeout() -> u64 {
    90
}
fn default_stale_after() -> u64 {
    24
}
fn default_log_directory() -> PathBuf {
    PathBuf::from("~/logs")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_max_files() -> u32 {
    10
}
fn default_enabled() -> bool {
    true
}
fn default_max_workers() -> usize {
    4
}
