// SPDX-License-Identifier: GPL-3.0-only

//! Bounded execution of external diagnostic commands

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::sys::signal::Signal;
use nvme_qual_types::CommandResult;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::Result;

/// A program plus its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command line as recorded in results and reports.
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Runs one invocation with a bounded wait.
///
/// Non-zero exits, timeouts and spawn failures are reported inside the
/// [`CommandResult`]. An `Err` is reserved for backend faults outside the
/// process itself; callers turn it into a failed result.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        description: &str,
        timeout: Duration,
    ) -> Result<CommandResult>;
}

/// Runs invocations as child processes with piped output.
///
/// A child still running when its timeout elapses is killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        description: &str,
        timeout: Duration,
    ) -> Result<CommandResult> {
        let rendered = invocation.render();
        debug!("Running {description}: {rendered}");
        let started = Instant::now();

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(error) => {
                warn!("Failed to start '{rendered}': {error}");
                return Ok(CommandResult::exception(
                    rendered,
                    error.to_string(),
                    started.elapsed(),
                ));
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                warn!("Failed waiting on '{rendered}': {error}");
                return Ok(CommandResult::exception(
                    rendered,
                    error.to_string(),
                    started.elapsed(),
                ));
            }
            Err(_) => {
                warn!("'{rendered}' timed out after {timeout:?}");
                return Ok(CommandResult::timed_out(rendered, timeout));
            }
        };

        let elapsed = started.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            debug!("{description} finished in {:.3}s", elapsed.as_secs_f64());
            Ok(CommandResult::succeeded(rendered, stdout, elapsed))
        } else {
            if let Some(signal) = output.status.signal() {
                let name = Signal::try_from(signal).map_or("unknown signal", Signal::as_str);
                warn!("'{rendered}' was killed by {name}");
            }
            let code = output
                .status
                .code()
                .or_else(|| output.status.signal().map(|signal| -signal))
                .unwrap_or(nvme_qual_types::EXCEPTION_EXIT_CODE);
            warn!("'{rendered}' exited with code {code}");
            Ok(CommandResult::response_failure(
                rendered, code, stdout, &stderr, elapsed,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_qual_types::{ErrorKind, TIMEOUT_EXIT_CODE};

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh", ["-c", script])
    }

    #[test]
    fn renders_command_line() {
        let invocation = Invocation::new("nvme", ["smart-log", "/dev/nvme0"]);
        assert_eq!(invocation.render(), "nvme smart-log /dev/nvme0");
        assert_eq!(Invocation::new("nvme", Vec::<String>::new()).render(), "nvme");
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let result = ProcessRunner::new()
            .run(&sh("echo 'vid : 0x144d'"), "probe", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.raw_output.trim(), "vid : 0x144d");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn non_zero_exit_is_response_failure() {
        let result = ProcessRunner::new()
            .run(&sh("echo partial; echo denied >&2; exit 3"), "probe", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.raw_output.trim(), "partial");
        assert_eq!(result.error_kind(), Some(ErrorKind::ResponseFailure));
        assert_eq!(result.error_message(), "Command failed with return code 3: denied");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let started = Instant::now();
        let result = ProcessRunner::new()
            .run(&sh("sleep 5"), "probe", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(result.is_timeout());
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.error_message().starts_with("Command timed out after"));
    }

    #[tokio::test]
    async fn signal_death_reports_negative_signal() {
        let result = ProcessRunner::new()
            .run(&sh("kill -9 $$"), "probe", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, -9);
        assert_eq!(result.error_kind(), Some(ErrorKind::ResponseFailure));
    }

    #[tokio::test]
    async fn missing_binary_is_execution_exception() {
        let invocation = Invocation::new("/nonexistent/nvme-qual-missing", ["list"]);
        let result = ProcessRunner::new()
            .run(&invocation, "probe", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::ExecutionException));
        assert!(result.error_message().starts_with("Exception during command execution:"));
    }
}
