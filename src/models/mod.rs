//! Command-models: per-vendor strategies describing how to pull a
//! configuration off a device.
//!
//! Each model is a small, stateless strategy with a fixed, ordered command
//! list and an optional post-processing step. Vendor variants that behave
//! identically are expressed as aliases in the registration table, not as
//! separate implementations.

mod cisco_ios;
mod cisco_nxos;
mod cisco_s300;
mod fortios;
mod routeros;

pub use cisco_ios::CiscoIos;
pub use cisco_nxos::CiscoNxos;
pub use cisco_s300::CiscoS300;
pub use fortios::Fortios;
pub use routeros::Routeros;

use std::sync::Arc;

/// Strategy contract for one device family.
pub trait DeviceModel: Send + Sync {
    /// Ordered list of commands to execute against the device.
    ///
    /// Always non-empty and identical across calls.
    fn commands(&self) -> &'static [&'static str];

    /// Post-process the concatenated command output.
    ///
    /// Identity by default. Any cleanup is best-effort and must never fail.
    fn process_config(&self, raw: String) -> String {
        raw
    }
}

/// One registered model: canonical type name, device-type aliases that
/// resolve to it, and its constructor.
pub struct ModelEntry {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub build: fn() -> Arc<dyn DeviceModel>,
}

/// All models shipped with the crate.
pub fn builtin_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            name: "cisco_ios",
            aliases: &["cisco_xe"],
            build: || Arc::new(CiscoIos),
        },
        ModelEntry {
            name: "cisco_nxos",
            aliases: &[],
            build: || Arc::new(CiscoNxos),
        },
        ModelEntry {
            name: "cisco_s300",
            aliases: &[],
            build: || Arc::new(CiscoS300),
        },
        ModelEntry {
            name: "fortios",
            aliases: &["fortigate", "fortinet"],
            build: || Arc::new(Fortios),
        },
        ModelEntry {
            name: "routeros",
            aliases: &["mikrotik", "mikrotik_routeros"],
            build: || Arc::new(Routeros),
        },
    ]
}
