// SPDX-License-Identifier: GPL-3.0-only

//! Device precondition probes run before any diagnostic step

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::unistd::{AccessFlags, access};
use nvme_qual_types::{CommandResult, FieldMapExt};
use tracing::{debug, warn};

use crate::catalog::{NAMESPACE_ID, NVME_BINARY};
use crate::error::{Result, SysError};
use crate::extract::{FieldRule, extract};
use crate::runner::{CommandRunner, Invocation};

/// Probes use a fixed bound independent of the profile timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const NSZE_RULE: &[FieldRule] = &[FieldRule::hex("nsze", r"(?i)\bnsze\s*:\s*0x([0-9a-f]+)")];

/// Resolve the nvme-cli binary on `PATH`.
pub fn locate_nvme_cli() -> Result<PathBuf> {
    which::which(NVME_BINARY).map_err(|_| SysError::NvmeCliNotFound)
}

/// The device node exists and the current user may read it.
pub fn device_readable(path: &Path) -> bool {
    match access(path, AccessFlags::R_OK) {
        Ok(()) => true,
        Err(errno) => {
            debug!("{} not readable: {errno}", path.display());
            false
        }
    }
}

pub fn namespace_probe(device: &str) -> Invocation {
    Invocation::new(
        NVME_BINARY,
        [
            "id-ns".to_string(),
            device.to_string(),
            "-n".to_string(),
            NAMESPACE_ID.to_string(),
        ],
    )
}

pub fn listing_probe() -> Invocation {
    Invocation::new(NVME_BINARY, ["list"])
}

/// Namespace 1 answered identify with a non-zero size.
pub fn namespace_initialized(result: &CommandResult) -> bool {
    result.success
        && extract(&result.raw_output, NSZE_RULE)
            .int("nsze")
            .is_some_and(|nsze| nsze > 0)
}

/// The enumeration listing mentions the device path.
pub fn device_listed(result: &CommandResult, device: &str) -> bool {
    result.success && result.raw_output.contains(device)
}

pub async fn check_namespace(runner: &dyn CommandRunner, device: &str) -> bool {
    match runner
        .run(&namespace_probe(device), "Namespace precondition", PROBE_TIMEOUT)
        .await
    {
        Ok(result) => namespace_initialized(&result),
        Err(error) => {
            warn!("Namespace probe failed: {error}");
            false
        }
    }
}

pub async fn check_listed(runner: &dyn CommandRunner, device: &str) -> bool {
    match runner
        .run(&listing_probe(), "Listing precondition", PROBE_TIMEOUT)
        .await
    {
        Ok(result) => device_listed(&result, device),
        Err(error) => {
            warn!("Listing probe failed: {error}");
            false
        }
    }
}
