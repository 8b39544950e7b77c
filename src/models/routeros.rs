//! MikroTik RouterOS command-model

use super::DeviceModel;

/// MikroTik routers. `mikrotik` and `mikrotik_routeros` device types are
/// aliases.
pub struct Routeros;

impl DeviceModel for Routeros {
    fn commands(&self) -> &'static [&'static str] {
        &[
            "/system resource print",
            "/system package update print",
            "/system routerboard print",
            "/export",
        ]
    }
}
