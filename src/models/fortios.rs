//! Fortinet FortiOS command-model

use super::DeviceModel;

/// FortiGate firewalls. `fortigate` and `fortinet` device types are aliases.
pub struct Fortios;

impl DeviceModel for Fortios {
    fn commands(&self) -> &'static [&'static str] {
        // "| grep ." avoids the --More-- pager on full config dumps
        &["get system status", "show | grep ."]
    }
}
