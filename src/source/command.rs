// External diagnostic commands with a bounded timeout

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait CommandRunner: Send + Sync {
    /// Captured stdout, or `None` on spawn failure, non-zero exit or timeout.
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// Runs the real program. A child still running at the deadline is killed.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommand {
    timeout: Duration,
}

impl Default for SystemCommand {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemCommand {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandRunner for SystemCommand {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program, error = %e, "command spawn failed");
                return None;
            }
        };
        let mut stdout = child.stdout.take()?;

        // Drain stdout while waiting so a chatty child cannot block on a full pipe.
        std::thread::scope(|scope| {
            let reader = scope.spawn(move || {
                let mut out = Vec::new();
                stdout.read_to_end(&mut out).map(|_| out)
            });

            let start = Instant::now();
            let status = loop {
                match child.try_wait() {
                    Ok(Some(status)) => break Some(status),
                    Ok(None) if start.elapsed() >= self.timeout => {
                        tracing::debug!(
                            program,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "command timed out, killing"
                        );
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                    Ok(None) => std::thread::sleep(POLL_INTERVAL),
                    Err(e) => {
                        tracing::debug!(program, error = %e, "command wait failed");
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                }
            };

            let output = reader.join().ok()?.ok()?;
            let status = status?;
            if !status.success() {
                tracing::debug!(program, status = %status, "command exited unsuccessfully");
                return None;
            }
            Some(String::from_utf8_lossy(&output).into_owned())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let runner = SystemCommand::default();
        let out = runner.run("sh", &["-c", "echo hello"]).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn non_zero_exit_is_unavailable() {
        let runner = SystemCommand::default();
        assert!(runner.run("sh", &["-c", "echo partial; exit 3"]).is_none());
    }

    #[test]
    fn missing_program_is_unavailable() {
        let runner = SystemCommand::default();
        assert!(runner.run("/nonexistent/perfstats-missing", &[]).is_none());
    }

    #[test]
    fn slow_command_is_killed_at_the_deadline() {
        let runner = SystemCommand::new(Duration::from_millis(100));
        let start = Instant::now();
        assert!(runner.run("sleep", &["5"]).is_none());
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
