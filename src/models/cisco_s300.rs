//! Cisco Small Business switches (CBS350, SG300, ...)

use super::DeviceModel;

pub struct CiscoS300;

impl DeviceModel for CiscoS300 {
    fn commands(&self) -> &'static [&'static str] {
        &["show running-config"]
    }
}
