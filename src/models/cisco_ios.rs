//! Cisco IOS / IOS-XE command-model

use super::DeviceModel;

/// Classic IOS and IOS-XE devices. The `cisco_xe` device type is an alias
/// for this model.
pub struct CiscoIos;

impl DeviceModel for CiscoIos {
    fn commands(&self) -> &'static [&'static str] {
        &["show version", "show running-config"]
    }
}
