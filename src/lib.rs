//! cfgsnap - network device configuration backup
//!
//! Pulls the fleet from configured inventory sources, captures each
//! device's configuration over SSH using a per-vendor command-model, and
//! fans the snapshots out to storage sinks with retention.

pub mod config;
pub mod device;
pub mod managers;
pub mod models;
pub mod registry;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use device::Device;
pub use managers::backup::BackupEngine;
pub use managers::logging::{init_console_logging, init_logging, LogGuard};
pub use managers::scheduler::{RunSummary, Scheduler};
pub use registry::PluginRegistry;
