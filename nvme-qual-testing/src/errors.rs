// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use nvme_qual_sys::SysError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QualError {
    #[error("config io error for {path:?}: {reason}")]
    ConfigIo { path: PathBuf, reason: String },
    #[error("invalid config: {reason}")]
    ConfigInvalid { reason: String },
    #[error("report io error for {path:?}: {reason}")]
    ReportIo { path: PathBuf, reason: String },
    #[error("unknown diagnostic step '{name}'")]
    UnknownStep { name: String },
    #[error(transparent)]
    Sys(#[from] SysError),
}

impl QualError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QualError>;
