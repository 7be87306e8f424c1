// SPDX-License-Identifier: GPL-3.0-only

//! Run configuration: TOML file, device-type overlay and CLI overrides

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use nvme_qual_sys::{CatalogOptions, DEFAULT_ERROR_LOG_ENTRIES};
use nvme_qual_types::{DeviceProfile, PcieExpectation, SmartThresholds};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{QualError, Result};
use crate::sequencer::RunContext;

pub const DEFAULT_CONFIG_FILE: &str = "nvme-qual.toml";

const MAX_COMMAND_TIMEOUT_SECS: u64 = 300;
const MAX_ERROR_LOG_ENTRIES: u32 = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Prod,
    Debug,
    /// Print the plan without touching the device.
    Dryrun,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Debug => "debug",
            Self::Dryrun => "dryrun",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualConfig {
    pub device: String,
    pub device_type: String,
    pub runmode: RunMode,
    pub description: String,
    /// Qualification id reported to the test-data system.
    pub quid: String,
    /// Overrides the profile's per-step timeout, in seconds.
    pub command_timeout: Option<u64>,
    pub step_delay_ms: u64,
    pub error_log_entries: u32,
    pub log_level: LoggingLevel,
    pub output_dir: PathBuf,
    pub save_raw_outputs: bool,
    pub expected_pcie: Option<PcieExpectation>,
    pub smart_thresholds: Option<SmartThresholds>,
}

impl Default for QualConfig {
    fn default() -> Self {
        Self {
            device: "/dev/nvme0n1".to_string(),
            device_type: nvme_qual_types::BASELINE_PROFILE_KEY.to_string(),
            runmode: RunMode::Prod,
            description: "NVMe SSD qualification".to_string(),
            quid: String::new(),
            command_timeout: None,
            step_delay_ms: 500,
            error_log_entries: DEFAULT_ERROR_LOG_ENTRIES,
            log_level: LoggingLevel::Info,
            output_dir: PathBuf::from("./logs"),
            save_raw_outputs: true,
            expected_pcie: None,
            smart_thresholds: None,
        }
    }
}

/// Values supplied on the command line, applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub device_type: Option<String>,
    pub runmode: Option<RunMode>,
    pub quid: Option<String>,
    pub log_level: Option<LoggingLevel>,
    pub output_dir: Option<PathBuf>,
}

impl QualConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| QualError::ConfigIo {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Like [`QualConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|error| QualError::invalid(error.to_string()))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(device_type) = overrides.device_type {
            self.device_type = device_type;
        }
        if let Some(runmode) = overrides.runmode {
            self.runmode = runmode;
        }
        if let Some(quid) = overrides.quid {
            self.quid = quid;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
    }

    /// The device-type profile with any file overrides layered on.
    ///
    /// An unknown device type falls back to the baseline profile; see
    /// [`Self::uses_fallback_profile`].
    pub fn profile(&self) -> DeviceProfile {
        let (mut profile, _) = DeviceProfile::select(&self.device_type);
        if let Some(pcie) = self.expected_pcie {
            profile.pcie = pcie;
        }
        if let Some(smart) = self.smart_thresholds {
            profile.smart = smart;
        }
        if let Some(timeout) = self.command_timeout {
            profile.command_timeout_secs = timeout;
        }
        profile
    }

    /// True when `device_type` names no known profile. Callers report this
    /// once logging is up.
    pub fn uses_fallback_profile(&self) -> bool {
        DeviceProfile::select(&self.device_type).1
    }

    pub fn effective_log_level(&self) -> LoggingLevel {
        match self.runmode {
            RunMode::Debug => LoggingLevel::Debug,
            RunMode::Prod | RunMode::Dryrun => self.log_level,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.device.starts_with("/dev/nvme") {
            return Err(QualError::invalid(format!(
                "device '{}' must be an NVMe device path (/dev/nvme*)",
                self.device
            )));
        }

        let timeout = self.profile().command_timeout_secs;
        if !(1..=MAX_COMMAND_TIMEOUT_SECS).contains(&timeout) {
            return Err(QualError::invalid(format!(
                "command timeout {timeout}s must be between 1 and {MAX_COMMAND_TIMEOUT_SECS} seconds"
            )));
        }

        if !(1..=MAX_ERROR_LOG_ENTRIES).contains(&self.error_log_entries) {
            return Err(QualError::invalid(format!(
                "error_log_entries {} must be between 1 and {MAX_ERROR_LOG_ENTRIES}",
                self.error_log_entries
            )));
        }

        if let Some(pcie) = self.expected_pcie
            && (pcie.width == 0 || pcie.speed == 0)
        {
            return Err(QualError::invalid(
                "expected_pcie width and speed must be non-zero",
            ));
        }

        Ok(())
    }

    /// Validate and build the explicit context handed to the sequencer.
    pub fn run_context(&self) -> Result<RunContext> {
        self.validate()?;
        let profile = self.profile();
        Ok(RunContext {
            device: self.device.clone(),
            command_timeout: Duration::from_secs(profile.command_timeout_secs),
            step_delay: Duration::from_millis(self.step_delay_ms),
            catalog: CatalogOptions {
                error_log_entries: self.error_log_entries,
            },
            profile,
        })
    }
}
