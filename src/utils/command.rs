//! Subprocess execution with timeouts
//!
//! The session transport shells out to external binaries (the OpenSSH
//! client). Output is drained on reader threads so a chatty child can never
//! deadlock on a full pipe, and the child is killed when the deadline passes.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a completed (non-timed-out) command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandRunError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("i/o error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run a command, capturing stdout/stderr, killing it if `timeout` elapses.
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<CommandOutput, CommandRunError> {
    debug!("running: {} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| CommandRunError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, program, timeout)?;

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            // Non-UTF8 bytes are replaced rather than failing the capture
            let mut raw = Vec::new();
            if pipe.read_to_end(&mut raw).is_ok() {
                buf = String::from_utf8_lossy(&raw).into_owned();
            }
        }
        buf
    })
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, CommandRunError> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CommandRunError::TimedOut {
                        program: program.to_string(),
                        timeout,
                    });
                }
                thread::sleep(Duration::from_millis(25));
            }
            Err(source) => {
                return Err(CommandRunError::Io {
                    program: program.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_run_captures_stdout() {
        let output = run_with_timeout("echo", &["hello"], Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    #[cfg(unix)]
    fn test_run_times_out() {
        let result = run_with_timeout("sleep", &["5"], Duration::from_millis(100));
        assert!(matches!(result, Err(CommandRunError::TimedOut { .. })));
    }

    #[test]
    fn test_spawn_error_for_missing_program() {
        let result = run_with_timeout(
            "definitely-not-a-real-binary-xyz",
            &[],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(CommandRunError::Spawn { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_is_not_an_error() {
        let output = run_with_timeout("false", &[], Duration::from_secs(5)).unwrap();
        assert!(!output.success());
    }
}
