// SPDX-License-Identifier: GPL-3.0-only

//! Device-class expectations used to judge a qualification run

use serde::{Deserialize, Serialize};

/// Profile used when the configured device type is unknown.
pub const BASELINE_PROFILE_KEY: &str = "bravo";

/// Negotiated PCIe link the device class is expected to train to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcieExpectation {
    /// Lane count (x1, x2, x4, x8, x16)
    pub width: u8,
    /// Generation index (1 = 2.5 GT/s, 2 = 5 GT/s, 3 = 8 GT/s, ...)
    pub speed: u8,
}

/// SMART health thresholds for a device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartThresholds {
    /// Composite temperature ceiling, in the units reported by the tool.
    pub max_temperature: u64,
    /// Minimum acceptable available spare (%)
    pub min_available_spare: u8,
    /// Maximum acceptable percentage used (%)
    pub max_percent_used: u8,
}

/// Immutable description of a device class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Device-type key (e.g. "bravo")
    pub key: String,
    /// Marketing series name
    pub series: String,
    /// Host interface summary (e.g. "PCIe Gen3 x4")
    pub interface: String,
    pub pcie: PcieExpectation,
    pub smart: SmartThresholds,
    /// Default per-step command timeout, in seconds.
    pub command_timeout_secs: u64,
    pub expected_namespaces: u32,
}

impl DeviceProfile {
    /// Keys of every built-in profile, baseline first.
    pub const KNOWN_KEYS: [&'static str; 4] = ["bravo", "delta", "echo", "compete"];

    /// Look up a built-in profile by device-type key.
    pub fn lookup(key: &str) -> Option<Self> {
        match key {
            BASELINE_PROFILE_KEY => Some(Self::baseline()),
            "delta" => Some(Self::build(
                "delta",
                "Delta Series High-Performance SSD",
                PcieExpectation { width: 8, speed: 4 },
                SmartThresholds {
                    max_temperature: 75,
                    min_available_spare: 10,
                    max_percent_used: 85,
                },
                25,
                1,
            )),
            "echo" => Some(Self::build(
                "echo",
                "Echo Series Multi-Namespace SSD",
                PcieExpectation { width: 4, speed: 4 },
                SmartThresholds {
                    max_temperature: 80,
                    min_available_spare: 15,
                    max_percent_used: 90,
                },
                35,
                2,
            )),
            "compete" => Some(Self::build(
                "compete",
                "Compete Series Flagship SSD",
                PcieExpectation { width: 16, speed: 4 },
                SmartThresholds {
                    max_temperature: 85,
                    min_available_spare: 20,
                    max_percent_used: 95,
                },
                20,
                4,
            )),
            _ => None,
        }
    }

    /// The profile applied to unknown device types.
    pub fn baseline() -> Self {
        Self::build(
            BASELINE_PROFILE_KEY,
            "Bravo Series Enterprise SSD",
            PcieExpectation { width: 4, speed: 3 },
            SmartThresholds {
                max_temperature: 70,
                min_available_spare: 10,
                max_percent_used: 80,
            },
            30,
            1,
        )
    }

    /// Select a profile, falling back to [`DeviceProfile::baseline`].
    ///
    /// The second element is `true` when the fallback was taken so the caller
    /// can warn about it.
    pub fn select(key: &str) -> (Self, bool) {
        match Self::lookup(key) {
            Some(profile) => (profile, false),
            None => (Self::baseline(), true),
        }
    }

    /// All built-in profiles, baseline first.
    pub fn all() -> Vec<Self> {
        Self::KNOWN_KEYS
            .iter()
            .filter_map(|key| Self::lookup(key))
            .collect()
    }

    fn build(
        key: &str,
        series: &str,
        pcie: PcieExpectation,
        smart: SmartThresholds,
        command_timeout_secs: u64,
        expected_namespaces: u32,
    ) -> Self {
        Self {
            key: key.to_string(),
            series: series.to_string(),
            interface: format!("PCIe Gen{} x{}", pcie.speed, pcie.width),
            pcie,
            smart,
            command_timeout_secs,
            expected_namespaces,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_falls_back_to_baseline() {
        let (profile, fell_back) = DeviceProfile::select("zulu");
        assert!(fell_back);
        assert_eq!(profile.key, BASELINE_PROFILE_KEY);
        assert_eq!(profile.pcie, PcieExpectation { width: 4, speed: 3 });
    }

    #[test]
    fn baseline_is_the_bravo_profile() {
        let baseline = DeviceProfile::baseline();
        assert_eq!(DeviceProfile::lookup(BASELINE_PROFILE_KEY), Some(baseline.clone()));
        assert_eq!(baseline.smart.max_temperature, 70);
        assert_eq!(baseline.command_timeout_secs, 30);
        assert_eq!(baseline.interface, "PCIe Gen3 x4");
    }

    #[test]
    fn known_profiles_carry_distinct_link_expectations() {
        let (delta, fell_back) = DeviceProfile::select("delta");
        assert!(!fell_back);
        assert_eq!(delta.pcie, PcieExpectation { width: 8, speed: 4 });
        assert_eq!(delta.interface, "PCIe Gen4 x8");

        let compete = DeviceProfile::lookup("compete").unwrap();
        assert_eq!(compete.pcie.width, 16);
        assert_eq!(compete.expected_namespaces, 4);
        assert_eq!(compete.command_timeout_secs, 20);
    }

    #[test]
    fn all_lists_every_known_key() {
        let keys: Vec<String> = DeviceProfile::all().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, DeviceProfile::KNOWN_KEYS);
    }
}
