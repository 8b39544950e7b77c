//! SSH session transport driving the OpenSSH client binary
//!
//! A session is an SSH ControlMaster connection: `open` authenticates once
//! and leaves a multiplexing master behind a control socket, each command is
//! a cheap `ssh -o ControlPath=...` invocation over that socket, and drop
//! tears the master down. Authentication is key-based (`BatchMode=yes`);
//! device passwords are ignored by this transport.

use super::{CommandError, ConnectError, Session, Timeouts, Transport};
use crate::device::Device;
use crate::utils::command::{run_with_timeout, CommandRunError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SshTransport {
    fn open(&self, device: &Device, timeouts: &Timeouts) -> Result<Box<dyn Session>, ConnectError> {
        if device.password.is_some() {
            warn!(
                "device '{}': password auth is not supported by the ssh transport, using keys",
                device.name
            );
        }

        let target = match &device.username {
            Some(user) => format!("{}@{}", user, device.host),
            None => device.host.clone(),
        };

        let control_path = std::env::temp_dir().join(format!(
            "cfgsnap-{}-{}.sock",
            std::process::id(),
            device.name.replace(['/', ' '], "_")
        ));

        let port = device.port.unwrap_or(22).to_string();
        let control_opt = control_path_arg(&control_path.display().to_string());
        let timeout_opt = connect_timeout_arg(timeouts.connect.as_secs().max(1));

        // -f -N: fork to background after auth, run no remote command.
        // The invocation returns once the master is established.
        let args = [
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-o",
            "ControlMaster=yes",
            "-o",
            control_opt.as_str(),
            "-o",
            timeout_opt.as_str(),
            "-p",
            port.as_str(),
            "-f",
            "-N",
            target.as_str(),
        ];

        debug!("opening ssh master to {} ({})", device.name, target);

        // Give the master a little slack beyond the ssh-level connect timeout
        let outer_timeout = timeouts.connect + Duration::from_secs(10);

        match run_with_timeout("ssh", &args, outer_timeout) {
            Ok(output) if output.success() => Ok(Box::new(SshSession {
                target,
                control_path,
            })),
            Ok(output) => Err(classify_connect_failure(&device.host, &output.stderr)),
            Err(CommandRunError::TimedOut { .. }) => Err(ConnectError::Timeout {
                host: device.host.clone(),
            }),
            Err(e) => Err(ConnectError::Other {
                host: device.host.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

fn control_path_arg(path: &str) -> String {
    format!("ControlPath={}", path)
}

fn connect_timeout_arg(secs: u64) -> String {
    format!("ConnectTimeout={}", secs)
}

fn classify_connect_failure(host: &str, stderr: &str) -> ConnectError {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied") || lower.contains("authentication") {
        ConnectError::Auth {
            host: host.to_string(),
        }
    } else if lower.contains("timed out") {
        ConnectError::Timeout {
            host: host.to_string(),
        }
    } else {
        ConnectError::Other {
            host: host.to_string(),
            reason: stderr.trim().to_string(),
        }
    }
}

struct SshSession {
    target: String,
    control_path: PathBuf,
}

impl Session for SshSession {
    fn run(&mut self, command: &str, timeout: Duration) -> Result<String, CommandError> {
        let control = control_path_arg(&self.control_path.display().to_string());
        let args = ["-o", &control, &self.target, command];

        match run_with_timeout("ssh", &args, timeout) {
            Ok(output) if output.success() => Ok(output.stdout),
            Ok(output) => Err(CommandError {
                command: command.to_string(),
                reason: output.stderr.trim().to_string(),
            }),
            Err(e) => Err(CommandError {
                command: command.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let control = control_path_arg(&self.control_path.display().to_string());
        let args = ["-O", "exit", "-o", &control, &self.target];
        if let Err(e) = run_with_timeout("ssh", &args, Duration::from_secs(10)) {
            debug!("failed to close ssh master for {}: {}", self.target, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_failure() {
        let err = classify_connect_failure("10.0.0.1", "user@10.0.0.1: Permission denied (publickey)");
        assert!(matches!(err, ConnectError::Auth { .. }));
    }

    #[test]
    fn test_classify_timeout() {
        let err = classify_connect_failure("10.0.0.1", "ssh: connect to host 10.0.0.1 port 22: Connection timed out");
        assert!(matches!(err, ConnectError::Timeout { .. }));
    }

    #[test]
    fn test_classify_other() {
        let err = classify_connect_failure("10.0.0.1", "ssh: Could not resolve hostname");
        assert!(matches!(err, ConnectError::Other { .. }));
    }
}
