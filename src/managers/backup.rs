//! Backup pipeline - captures one device's configuration
//!
//! The unit of work for a single device: open a session, run the
//! command-model's commands strictly in order, concatenate and post-process
//! the output. The session is released on every exit path (it is dropped
//! when this function returns, success or failure). Storage fan-out happens
//! in the orchestrator, not here.

use crate::device::Device;
use crate::models::DeviceModel;
use crate::registry::RegistryError;
use crate::transport::{CommandError, ConnectError, Timeouts, Transport};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a device backup failed. Every variant collapses to one failed
/// device; nothing here ever aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error(transparent)]
    Model(#[from] RegistryError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

pub struct BackupEngine {
    transport: Arc<dyn Transport>,
    timeouts: Timeouts,
}

impl BackupEngine {
    pub fn new(transport: Arc<dyn Transport>, timeouts: Timeouts) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    /// Capture one device's configuration.
    ///
    /// Returns the processed snapshot text, or the first failure. Commands
    /// after a failed one are not attempted: no partial snapshot is ever
    /// produced.
    pub fn backup_device(
        &self,
        device: &Device,
        model: &dyn DeviceModel,
    ) -> Result<String, BackupError> {
        info!("connecting to {} ({})", device.name, device.host);

        let mut session = self.transport.open(device, &self.timeouts).map_err(|e| {
            match &e {
                ConnectError::Timeout { .. } => {
                    error!("timeout connecting to {}: {}", device.name, e)
                }
                ConnectError::Auth { .. } => {
                    error!("authentication failed for {}: {}", device.name, e)
                }
                ConnectError::Other { .. } => {
                    error!("error connecting to {}: {}", device.name, e)
                }
            }
            e
        })?;

        let mut sections = Vec::new();
        for command in model.commands() {
            debug!("{}: executing '{}'", device.name, command);
            let output = session.run(command, self.timeouts.command).map_err(|e| {
                error!("{}: {}", device.name, e);
                e
            })?;
            sections.push(format!("! Command: {}\n{}\n", command, output));
        }

        let snapshot = model.process_config(sections.join("\n"));
        info!("successfully backed up {}", device.name);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CiscoIos;
    use crate::transport::mock::{MockBehavior, MockTransport};
    use std::collections::HashMap;

    fn device() -> Device {
        Device::new("core-sw1", "10.0.0.1", "cisco_ios")
    }

    #[test]
    fn test_snapshot_concatenates_in_command_order() {
        let mut outputs = HashMap::new();
        outputs.insert("show version".to_string(), "IOS 15.2".to_string());
        outputs.insert(
            "show running-config".to_string(),
            "hostname core-sw1".to_string(),
        );
        let transport = MockTransport::new().behave("10.0.0.1", MockBehavior::Respond(outputs));

        let engine = BackupEngine::new(Arc::new(transport), Timeouts::default());
        let snapshot = engine.backup_device(&device(), &CiscoIos).unwrap();

        let version_pos = snapshot.find("! Command: show version").unwrap();
        let config_pos = snapshot.find("! Command: show running-config").unwrap();
        assert!(version_pos < config_pos);
        assert!(snapshot.contains("IOS 15.2"));
        assert!(snapshot.contains("hostname core-sw1"));
    }

    #[test]
    fn test_connect_timeout_fails_device() {
        let transport = MockTransport::new().behave("10.0.0.1", MockBehavior::ConnectTimeout);
        let engine = BackupEngine::new(Arc::new(transport), Timeouts::default());

        let err = engine.backup_device(&device(), &CiscoIos).unwrap_err();
        assert!(matches!(
            err,
            BackupError::Connect(ConnectError::Timeout { .. })
        ));
    }

    #[test]
    fn test_command_failure_aborts_remaining_commands() {
        let transport = MockTransport::new().behave("10.0.0.1", MockBehavior::FailCommand(0));
        let engine = BackupEngine::new(Arc::new(transport.clone()), Timeouts::default());

        let err = engine.backup_device(&device(), &CiscoIos).unwrap_err();
        assert!(matches!(err, BackupError::Command(_)));

        // CiscoIos has two commands; only the failing first one ran
        assert_eq!(transport.command_count("10.0.0.1"), 1);
    }
}
