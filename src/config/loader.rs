use super::types::*;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.scheduler.max_workers == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.max_workers must be at least 1".to_string(),
        ));
    }

    if config.global.connect_timeout_seconds == 0 || config.global.command_timeout_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "timeouts must be at least 1 second".to_string(),
        ));
    }

    // No cron with the scheduler enabled is allowed: manual triggers only
    if let Some(ref expr) = config.scheduler.cron {
        validate_cron(expr)?;
    }

    Ok(())
}

fn validate_cron(expr: &str) -> Result<()> {
    cron::Schedule::from_str(&normalize_cron(expr)).map_err(|e| {
        ConfigError::ValidationError(format!("invalid cron expression '{}': {}", expr, e))
    })?;
    Ok(())
}

/// Accept standard 5-field cron expressions by prepending a seconds field,
/// which the `cron` crate requires.
pub fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_five_field_cron() {
        assert_eq!(normalize_cron("0 2 * * *"), "0 0 2 * * *");
        assert_eq!(normalize_cron("0 0 2 * * *"), "0 0 2 * * *");
    }

    #[test]
    fn test_validate_cron_expressions() {
        assert!(validate_cron("0 2 * * *").is_ok());
        assert!(validate_cron("*/5 * * * *").is_ok());
        assert!(validate_cron("not a schedule").is_err());
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.max_workers, 4);
        assert_eq!(config.global.stale_after_hours, 24);
        assert!(config.sources.is_empty());
        assert!(config.sinks.is_empty());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config: Config = toml::from_str("[scheduler]\nmax_workers = 0").unwrap();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_capability_spec_config_block() {
        let config: Config = toml::from_str(
            r#"
[[sinks]]
type = "filesystem"
[sinks.config]
path = "/var/backups/network"
retention = 5
"#,
        )
        .unwrap();

        assert_eq!(config.sinks.len(), 1);
        assert_eq!(config.sinks[0].type_name, "filesystem");
        let retention = config.sinks[0]
            .config
            .get("retention")
            .and_then(|v| v.as_integer());
        assert_eq!(retention, Some(5));
    }

    #[test]
    fn test_capability_spec_defaults_to_empty_config() {
        let config: Config = toml::from_str(
            r#"
[[sources]]
type = "static"
"#,
        )
        .unwrap();
        assert!(config.sources[0].config.as_table().unwrap().is_empty());
    }
}
