//! Inventory sources
//!
//! An inventory source produces the device fleet for a run. Sources are
//! resolved by type name through the capability registry and fail in
//! isolation: one broken source only excludes its own devices.

mod static_list;

pub use static_list::StaticSource;

use crate::device::Device;
use anyhow::Result;

pub trait InventorySource: Send + Sync {
    /// Type name this instance was resolved under (for logging).
    fn name(&self) -> &str;

    /// Produce the current device list. May hit the network and fail.
    fn devices(&self) -> Result<Vec<Device>>;
}
