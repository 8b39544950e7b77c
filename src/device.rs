//! Device data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A managed network endpoint targeted for configuration backup.
///
/// Devices are produced fresh on every inventory sync; `name` is the
/// identity used for upserts into the device cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name (primary key across the fleet)
    pub name: String,

    /// Address the session transport connects to
    pub host: String,

    /// Selects the command-model (e.g. "cisco_ios", "routeros")
    pub device_type: String,

    /// SSH port override
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Timestamp of the last successful snapshot, if any
    #[serde(default)]
    pub last_backup: Option<DateTime<Utc>>,
}

impl Device {
    /// Create a device with connection facts only (no credentials yet)
    pub fn new(name: impl Into<String>, host: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            device_type: device_type.into(),
            port: None,
            username: None,
            password: None,
            last_backup: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_roundtrip() {
        let device = Device {
            name: "core-sw1".to_string(),
            host: "10.0.0.1".to_string(),
            device_type: "cisco_ios".to_string(),
            port: Some(2222),
            username: Some("backup".to_string()),
            password: None,
            last_backup: None,
        };

        let json = serde_json::to_string(&device).unwrap();
        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, device);
    }

    #[test]
    fn test_device_optional_fields_default() {
        let toml_src = r#"
name = "edge-fw"
host = "192.0.2.10"
device_type = "fortios"
"#;
        let device: Device = toml::from_str(toml_src).unwrap();
        assert_eq!(device.name, "edge-fw");
        assert!(device.port.is_none());
        assert!(device.username.is_none());
        assert!(device.last_backup.is_none());
    }
}
