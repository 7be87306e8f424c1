// SPDX-License-Identifier: GPL-3.0-only

//! Outcome of one external diagnostic invocation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fields::FieldMap;

/// Exit code recorded when the wait for a process was abandoned.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code recorded when the process could not be run at all.
pub const EXCEPTION_EXIT_CODE: i32 = -2;

/// Structural class of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The process exited with a non-zero code.
    ResponseFailure,
    /// The process did not finish within its timeout.
    Timeout,
    /// Spawning or waiting on the process failed.
    ExecutionException,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResponseFailure => "response failure",
            Self::Timeout => "timeout",
            Self::ExecutionException => "execution exception",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Uniform result envelope produced once per executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Rendered command line
    pub command: String,
    pub success: bool,
    pub exit_code: i32,
    /// Captured standard output
    pub raw_output: String,
    /// Fields extracted from `raw_output` (empty unless `success`)
    pub parsed: FieldMap,
    pub error: Option<CommandError>,
    /// Wall-clock duration in seconds
    pub execution_secs: f64,
}

impl CommandResult {
    pub fn succeeded(command: impl Into<String>, stdout: String, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            success: true,
            exit_code: 0,
            raw_output: stdout,
            parsed: FieldMap::new(),
            error: None,
            execution_secs: elapsed.as_secs_f64(),
        }
    }

    pub fn response_failure(
        command: impl Into<String>,
        exit_code: i32,
        stdout: String,
        stderr: &str,
        elapsed: Duration,
    ) -> Self {
        let mut message = format!("Command failed with return code {exit_code}");
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            message.push_str(": ");
            message.push_str(stderr);
        }
        Self {
            command: command.into(),
            success: false,
            exit_code,
            raw_output: stdout,
            parsed: FieldMap::new(),
            error: Some(CommandError {
                kind: ErrorKind::ResponseFailure,
                message,
            }),
            execution_secs: elapsed.as_secs_f64(),
        }
    }

    /// The recorded duration is the timeout itself.
    pub fn timed_out(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            success: false,
            exit_code: TIMEOUT_EXIT_CODE,
            raw_output: String::new(),
            parsed: FieldMap::new(),
            error: Some(CommandError {
                kind: ErrorKind::Timeout,
                message: format!("Command timed out after {} seconds", timeout.as_secs_f64()),
            }),
            execution_secs: timeout.as_secs_f64(),
        }
    }

    pub fn exception(command: impl Into<String>, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            success: false,
            exit_code: EXCEPTION_EXIT_CODE,
            raw_output: String::new(),
            parsed: FieldMap::new(),
            error: Some(CommandError {
                kind: ErrorKind::ExecutionException,
                message: format!("Exception during command execution: {}", message.into()),
            }),
            execution_secs: elapsed.as_secs_f64(),
        }
    }

    /// Attach extracted fields. Only successful results carry fields.
    pub fn with_parsed(mut self, parsed: FieldMap) -> Self {
        if self.success {
            self.parsed = parsed;
        }
        self
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    pub fn error_message(&self) -> &str {
        self.error.as_ref().map(|error| error.message.as_str()).unwrap_or("")
    }

    pub fn is_timeout(&self) -> bool {
        self.error_kind() == Some(ErrorKind::Timeout)
    }
}
