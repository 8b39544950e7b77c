//! Configuration for cfgsnap
//!
//! TOML configuration with serde defaults and a validation pass after
//! parse. Capability blocks (`[[sources]]`, `[[sinks]]`) carry a `type`
//! resolved through the registry plus an opaque `config` table handed to
//! the implementation's constructor.

mod loader;
mod types;

pub use loader::{load_config, normalize_cron, ConfigError, Result};
pub use types::*;
