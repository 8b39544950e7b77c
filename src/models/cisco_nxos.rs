//! Cisco NX-OS (Nexus) command-model

use super::DeviceModel;

pub struct CiscoNxos;

impl DeviceModel for CiscoNxos {
    fn commands(&self) -> &'static [&'static str] {
        &["show version", "show inventory", "show running-config"]
    }
}
