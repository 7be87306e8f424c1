// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("nvme-cli binary not found on PATH")]
    NvmeCliNotFound,

    #[error("Invalid extraction pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
