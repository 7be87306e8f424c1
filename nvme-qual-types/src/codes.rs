// SPDX-License-Identifier: GPL-3.0-only

//! Failure-code taxonomy
//!
//! The rendered strings are a stable vocabulary consumed by reporting and
//! downstream test-data systems; do not change them.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::registers::generation_name;
use crate::step::DiagnosticStep;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureCode {
    // === Precondition ===
    PreconditionDeviceNotFound,
    PreconditionNamespaceNotInitialized,
    PreconditionDeviceNotListed,

    // === SMART ===
    SmartDataUnavailable,
    SmartAvailableSpareLow,
    SmartNvmSubsystemDegraded,
    SmartMediaReadOnly,
    SmartVolatileBackupFailed,
    SmartMediaErrors(u64),
    SmartHighWearLevel,
    SmartSpareBelowThreshold,

    // === PCIe link ===
    PcieRegisterDataUnavailable,
    PcieLinkWidthMismatch { expected: u8, actual: u8 },
    PcieLinkSpeedBelowExpected { expected: u8, actual: u8 },
    PcieLnkstaRegisterNotFound,

    // === Command execution ===
    CommandTimeout(DiagnosticStep),
    CommandResponseFail(DiagnosticStep),

    // === Firmware health ===
    FirmwareHealthDataUnavailable,
    FirmwareFatalErrorCstsCfs,
    FirmwareControllerNotReady,
    FirmwareCstsRegisterNotFound,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionDeviceNotFound => f.write_str("PRECONDITION_DEVICE_NOT_FOUND"),
            Self::PreconditionNamespaceNotInitialized => {
                f.write_str("PRECONDITION_NAMESPACE_NOT_INITIALIZED")
            }
            Self::PreconditionDeviceNotListed => f.write_str("PRECONDITION_DEVICE_NOT_LISTED"),
            Self::SmartDataUnavailable => f.write_str("SMART_DATA_UNAVAILABLE"),
            Self::SmartAvailableSpareLow => f.write_str("SMART_AVAILABLE_SPARE_LOW"),
            Self::SmartNvmSubsystemDegraded => f.write_str("SMART_NVM_SUBSYSTEM_DEGRADED"),
            Self::SmartMediaReadOnly => f.write_str("SMART_MEDIA_READ_ONLY"),
            Self::SmartVolatileBackupFailed => f.write_str("SMART_VOLATILE_BACKUP_FAILED"),
            Self::SmartMediaErrors(count) => write!(f, "SMART_MEDIA_ERRORS_{count}"),
            Self::SmartHighWearLevel => f.write_str("SMART_HIGH_WEAR_LEVEL"),
            Self::SmartSpareBelowThreshold => f.write_str("SMART_SPARE_BELOW_THRESHOLD"),
            Self::PcieRegisterDataUnavailable => f.write_str("PCIE_REGISTER_DATA_UNAVAILABLE"),
            Self::PcieLinkWidthMismatch { expected, actual } => {
                write!(f, "PCIE_LINK_WIDTH_MISMATCH_EXPECTED_x{expected}_ACTUAL_x{actual}")
            }
            Self::PcieLinkSpeedBelowExpected { expected, actual } => write!(
                f,
                "PCIE_LINK_SPEED_BELOW_EXPECTED_{}_ACTUAL_{}",
                generation_name(*expected),
                generation_name(*actual)
            ),
            Self::PcieLnkstaRegisterNotFound => f.write_str("PCIE_LNKSTA_REGISTER_NOT_FOUND"),
            Self::CommandTimeout(step) => {
                write!(f, "COMMAND_TIMEOUT_{}", step.name().to_ascii_uppercase())
            }
            Self::CommandResponseFail(step) => {
                write!(f, "COMMAND_RESPONSE_FAIL_{}", step.name().to_ascii_uppercase())
            }
            Self::FirmwareHealthDataUnavailable => {
                f.write_str("FIRMWARE_HEALTH_DATA_UNAVAILABLE")
            }
            Self::FirmwareFatalErrorCstsCfs => f.write_str("FIRMWARE_FATAL_ERROR_CSTS_CFS"),
            Self::FirmwareControllerNotReady => f.write_str("FIRMWARE_CONTROLLER_NOT_READY"),
            Self::FirmwareCstsRegisterNotFound => f.write_str("FIRMWARE_CSTS_REGISTER_NOT_FOUND"),
        }
    }
}

impl Serialize for FailureCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tagged_codes() {
        assert_eq!(FailureCode::SmartMediaErrors(3).to_string(), "SMART_MEDIA_ERRORS_3");
        assert_eq!(
            FailureCode::PcieLinkWidthMismatch { expected: 4, actual: 8 }.to_string(),
            "PCIE_LINK_WIDTH_MISMATCH_EXPECTED_x4_ACTUAL_x8"
        );
        assert_eq!(
            FailureCode::PcieLinkSpeedBelowExpected { expected: 3, actual: 2 }.to_string(),
            "PCIE_LINK_SPEED_BELOW_EXPECTED_Gen3_ACTUAL_Gen2"
        );
        assert_eq!(
            FailureCode::CommandTimeout(DiagnosticStep::NvmeSmartLog).to_string(),
            "COMMAND_TIMEOUT_NVME_SMART_LOG"
        );
        assert_eq!(
            FailureCode::CommandResponseFail(DiagnosticStep::NvmeIdNs).to_string(),
            "COMMAND_RESPONSE_FAIL_NVME_ID_NS"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&vec![
            FailureCode::FirmwareFatalErrorCstsCfs,
            FailureCode::SmartHighWearLevel,
        ])
        .unwrap();
        assert_eq!(json, r#"["FIRMWARE_FATAL_ERROR_CSTS_CFS","SMART_HIGH_WEAR_LEVEL"]"#);
    }
}
