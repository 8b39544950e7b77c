//! Device cache
//!
//! A single shared store of the last-known fleet. Only the orchestrator
//! writes it (one aggregated upsert after the worker pool drains, plus the
//! staleness sweep); workers never touch it directly.

mod json;

pub use json::JsonDeviceCache;

use crate::device::Device;
use anyhow::Result;
use chrono::Duration;

pub trait DeviceCache: Send + Sync {
    /// Insert or update devices by name. Existing entries keep their
    /// `last_backup` when the incoming device does not carry one; the
    /// last-seen timestamp is always refreshed.
    fn upsert_many(&self, devices: &[Device]) -> Result<()>;

    /// Remove devices not refreshed within `max_age`. Returns how many were
    /// removed.
    fn remove_stale(&self, max_age: Duration) -> Result<usize>;

    /// All cached devices, sorted by name.
    fn all(&self) -> Result<Vec<Device>>;

    /// Single device by name.
    fn get(&self, name: &str) -> Result<Option<Device>>;
}
