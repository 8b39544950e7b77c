//! Device session transport boundary
//!
//! The core never speaks a wire protocol itself. It asks a [`Transport`] for
//! a [`Session`] and runs the command-model's commands over it. The shipped
//! implementation drives the OpenSSH client binary ([`ssh::SshTransport`]);
//! tests use the scriptable [`mock::MockTransport`].

pub mod ssh;

use crate::device::Device;
use std::time::Duration;

/// Connect/command timeouts applied to every device session.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub command: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(60),
            command: Duration::from_secs(90),
        }
    }
}

/// Why a session could not be opened. The pipeline logs each category
/// distinctly but collapses all of them to a device-level failure.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection to {host} timed out")]
    Timeout { host: String },

    #[error("authentication failed for {host}")]
    Auth { host: String },

    #[error("connection to {host} failed: {reason}")]
    Other { host: String, reason: String },
}

/// A command failed mid-session.
#[derive(Debug, thiserror::Error)]
#[error("command '{command}' failed: {reason}")]
pub struct CommandError {
    pub command: String,
    pub reason: String,
}

/// Factory for device sessions. Implementations must be shareable across
/// concurrent device workers.
pub trait Transport: Send + Sync {
    fn open(&self, device: &Device, timeouts: &Timeouts) -> Result<Box<dyn Session>, ConnectError>;
}

/// One open session to one device. Dropped on every pipeline exit path,
/// which releases the underlying connection.
pub trait Session: Send {
    fn run(&mut self, command: &str, timeout: Duration) -> Result<String, CommandError>;
}

/// Scriptable transport for tests: behaviors are keyed by host, unknown
/// hosts get a default echo response, every executed command is recorded.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier, Mutex};

    /// Per-host scripted behavior.
    #[derive(Clone)]
    pub enum MockBehavior {
        /// Session opens; each command returns the mapped output, or
        /// `"<command> output"` when unmapped.
        Respond(HashMap<String, String>),
        /// Session open fails with a timeout.
        ConnectTimeout,
        /// Session open fails with an authentication error.
        AuthFailure,
        /// Session opens but the Nth command (0-based) fails.
        FailCommand(usize),
        /// Session opens; each command rendezvouses on the barrier, then
        /// blocks on it a second time before returning. Lets a test hold a
        /// run open at a known point and release it later.
        Gate(Arc<Barrier>),
    }

    #[derive(Clone, Default)]
    pub struct MockTransport {
        behaviors: Arc<Mutex<HashMap<String, MockBehavior>>>,
        /// Every (host, command) pair executed, in call order.
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn behave(self, host: &str, behavior: MockBehavior) -> Self {
            self.behaviors
                .lock()
                .unwrap()
                .insert(host.to_string(), behavior);
            self
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn command_count(&self, host: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(h, _)| h == host)
                .count()
        }
    }

    impl Transport for MockTransport {
        fn open(
            &self,
            device: &Device,
            _timeouts: &Timeouts,
        ) -> Result<Box<dyn Session>, ConnectError> {
            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(&device.host)
                .cloned()
                .unwrap_or_else(|| MockBehavior::Respond(HashMap::new()));

            match behavior {
                MockBehavior::ConnectTimeout => Err(ConnectError::Timeout {
                    host: device.host.clone(),
                }),
                MockBehavior::AuthFailure => Err(ConnectError::Auth {
                    host: device.host.clone(),
                }),
                MockBehavior::Respond(outputs) => Ok(Box::new(MockSession {
                    host: device.host.clone(),
                    outputs,
                    fail_at: None,
                    gate: None,
                    executed: 0,
                    calls: Arc::clone(&self.calls),
                })),
                MockBehavior::FailCommand(n) => Ok(Box::new(MockSession {
                    host: device.host.clone(),
                    outputs: HashMap::new(),
                    fail_at: Some(n),
                    gate: None,
                    executed: 0,
                    calls: Arc::clone(&self.calls),
                })),
                MockBehavior::Gate(barrier) => Ok(Box::new(MockSession {
                    host: device.host.clone(),
                    outputs: HashMap::new(),
                    fail_at: None,
                    gate: Some(barrier),
                    executed: 0,
                    calls: Arc::clone(&self.calls),
                })),
            }
        }
    }

    struct MockSession {
        host: String,
        outputs: HashMap<String, String>,
        fail_at: Option<usize>,
        gate: Option<Arc<Barrier>>,
        executed: usize,
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Session for MockSession {
        fn run(&mut self, command: &str, _timeout: Duration) -> Result<String, CommandError> {
            self.calls
                .lock()
                .unwrap()
                .push((self.host.clone(), command.to_string()));

            if let Some(gate) = &self.gate {
                gate.wait();
                gate.wait();
            }

            let index = self.executed;
            self.executed += 1;

            if self.fail_at == Some(index) {
                return Err(CommandError {
                    command: command.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }

            Ok(self
                .outputs
                .get(command)
                .cloned()
                .unwrap_or_else(|| format!("{} output", command)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::device::Device;
    use std::collections::HashMap;

    fn device(host: &str) -> Device {
        Device::new("dev1", host, "cisco_ios")
    }

    #[test]
    fn test_mock_scripted_output() {
        let mut outputs = HashMap::new();
        outputs.insert("show version".to_string(), "IOS 15.2".to_string());
        let transport = MockTransport::new().behave("10.0.0.1", MockBehavior::Respond(outputs));

        let mut session = transport
            .open(&device("10.0.0.1"), &Timeouts::default())
            .unwrap();
        let out = session.run("show version", Duration::from_secs(1)).unwrap();
        assert_eq!(out, "IOS 15.2");
        assert_eq!(transport.command_count("10.0.0.1"), 1);
    }

    #[test]
    fn test_mock_connect_failures() {
        let transport = MockTransport::new()
            .behave("10.0.0.1", MockBehavior::ConnectTimeout)
            .behave("10.0.0.2", MockBehavior::AuthFailure);

        assert!(matches!(
            transport.open(&device("10.0.0.1"), &Timeouts::default()),
            Err(ConnectError::Timeout { .. })
        ));
        assert!(matches!(
            transport.open(&device("10.0.0.2"), &Timeouts::default()),
            Err(ConnectError::Auth { .. })
        ));
    }

    #[test]
    fn test_mock_command_failure_at_index() {
        let transport = MockTransport::new().behave("10.0.0.1", MockBehavior::FailCommand(1));
        let mut session = transport
            .open(&device("10.0.0.1"), &Timeouts::default())
            .unwrap();

        assert!(session.run("first", Duration::from_secs(1)).is_ok());
        assert!(session.run("second", Duration::from_secs(1)).is_err());
    }
}
