//! Static inventory source: devices listed directly in the configuration

use super::InventorySource;
use crate::device::Device;
use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct StaticConfig {
    #[serde(default)]
    devices: Vec<Device>,
}

pub struct StaticSource {
    devices: Vec<Device>,
}

impl StaticSource {
    pub fn from_config(config: &toml::Value) -> Result<Self> {
        let parsed: StaticConfig = config
            .clone()
            .try_into()
            .context("invalid static source configuration")?;

        for device in &parsed.devices {
            if device.name.is_empty() {
                bail!("static source: device with empty name");
            }
            if device.host.is_empty() {
                bail!("static source: device '{}' has empty host", device.name);
            }
            if device.device_type.is_empty() {
                bail!("static source: device '{}' has empty device_type", device.name);
            }
        }

        Ok(Self {
            devices: parsed.devices,
        })
    }
}

impl InventorySource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.clone())
    }
}
