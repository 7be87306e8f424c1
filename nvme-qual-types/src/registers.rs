// SPDX-License-Identifier: GPL-3.0-only

//! Bit-level decoding of NVMe and PCIe protocol fields
//!
//! Every decoder takes the raw integer as parsed from the tool output and
//! works on a fixed-width view of it. Bits outside that width are ignored.

use enumflags2::{BitFlags, bitflags};

/// SMART log critical-warning byte (log page 0x02, byte 0).
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalWarning {
    /// Bit 0: available spare fell below the threshold.
    AvailableSpareLow = 0b0000_0001,
    /// Bit 1: a temperature threshold was crossed. Informational only.
    TemperatureThreshold = 0b0000_0010,
    /// Bit 2: NVM subsystem reliability degraded.
    NvmSubsystemDegraded = 0b0000_0100,
    /// Bit 3: media placed in read-only mode.
    MediaReadOnly = 0b0000_1000,
    /// Bit 4: volatile memory backup device failed.
    VolatileBackupFailed = 0b0001_0000,
    /// Bit 5: persistent memory region read-only (reserved on older revisions).
    Reserved5 = 0b0010_0000,
    Reserved6 = 0b0100_0000,
    Reserved7 = 0b1000_0000,
}

pub type CriticalWarningFlags = BitFlags<CriticalWarning>;

impl CriticalWarning {
    /// Decode the low byte of a parsed critical-warning value.
    pub fn decode(raw: u64) -> CriticalWarningFlags {
        BitFlags::from_bits_truncate((raw & 0xFF) as u8)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AvailableSpareLow => "available_spare_low",
            Self::TemperatureThreshold => "temperature_threshold",
            Self::NvmSubsystemDegraded => "nvm_subsystem_degraded",
            Self::MediaReadOnly => "media_read_only",
            Self::VolatileBackupFailed => "volatile_backup_failed",
            Self::Reserved5 => "reserved_bit_5",
            Self::Reserved6 => "reserved_bit_6",
            Self::Reserved7 => "reserved_bit_7",
        }
    }
}

/// PCIe Link Status register (LNKSTA, 16 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus(u16);

impl LinkStatus {
    /// Bits [3:0]: current link speed (generation index).
    const SPEED_MASK: u16 = 0x000F;
    /// Bits [9:4]: negotiated link width (lane count).
    const WIDTH_SHIFT: u16 = 4;
    const WIDTH_MASK: u16 = 0x3F;

    pub fn decode(raw: u64) -> Self {
        Self((raw & 0xFFFF) as u16)
    }

    pub fn width(self) -> u8 {
        ((self.0 >> Self::WIDTH_SHIFT) & Self::WIDTH_MASK) as u8
    }

    pub fn speed(self) -> u8 {
        (self.0 & Self::SPEED_MASK) as u8
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

/// NVMe Controller Status register (CSTS, 32 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus(u32);

impl ControllerStatus {
    /// Bit 0: RDY.
    const READY: u32 = 1 << 0;
    /// Bit 1: CFS, controller fatal status.
    const FATAL: u32 = 1 << 1;

    pub fn decode(raw: u64) -> Self {
        Self((raw & 0xFFFF_FFFF) as u32)
    }

    pub fn ready(self) -> bool {
        self.0 & Self::READY != 0
    }

    pub fn fatal(self) -> bool {
        self.0 & Self::FATAL != 0
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// NVMe Controller Configuration register (CC, 32 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig(u32);

impl ControllerConfig {
    /// Bit 0: EN.
    const ENABLE: u32 = 1 << 0;

    pub fn decode(raw: u64) -> Self {
        Self((raw & 0xFFFF_FFFF) as u32)
    }

    pub fn enabled(self) -> bool {
        self.0 & Self::ENABLE != 0
    }
}

/// Render a PCIe generation index as `Gen<n>`.
pub fn generation_name(speed: u8) -> String {
    format!("Gen{speed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_warning_bits_decode_independently() {
        let flags = CriticalWarning::decode(0x02);
        assert!(flags.contains(CriticalWarning::TemperatureThreshold));
        assert_eq!(flags.iter().count(), 1);

        let flags = CriticalWarning::decode(0x1D);
        assert!(flags.contains(CriticalWarning::AvailableSpareLow));
        assert!(!flags.contains(CriticalWarning::TemperatureThreshold));
        assert!(flags.contains(CriticalWarning::NvmSubsystemDegraded));
        assert!(flags.contains(CriticalWarning::MediaReadOnly));
        assert!(flags.contains(CriticalWarning::VolatileBackupFailed));
    }

    #[test]
    fn critical_warning_ignores_bits_above_byte() {
        assert!(CriticalWarning::decode(0x100).is_empty());
    }

    #[test]
    fn link_status_splits_width_and_speed() {
        // width 4 (bits 9:4 = 0b000100), speed 3
        let lnksta = LinkStatus::decode(0x0043);
        assert_eq!(lnksta.width(), 4);
        assert_eq!(lnksta.speed(), 3);

        let lnksta = LinkStatus::decode(0x1084);
        assert_eq!(lnksta.width(), 8);
        assert_eq!(lnksta.speed(), 4);
    }

    #[test]
    fn controller_status_bits() {
        assert!(ControllerStatus::decode(0x1).ready());
        assert!(!ControllerStatus::decode(0x1).fatal());
        assert!(ControllerStatus::decode(0x2).fatal());
        assert!(!ControllerStatus::decode(0x2).ready());
        let both = ControllerStatus::decode(0x3);
        assert!(both.ready() && both.fatal());
    }

    #[test]
    fn controller_config_enable_bit() {
        assert!(ControllerConfig::decode(0x0046_0001).enabled());
        assert!(!ControllerConfig::decode(0x0046_0000).enabled());
    }
}
