// SPDX-License-Identifier: GPL-3.0-only

//! The fixed diagnostic operations of a qualification run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the eight diagnostic operations, in execution order.
///
/// Later steps assume controller and namespace state established by earlier
/// ones, so the declaration order is the execution order (and the `Ord`
/// order used for result maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStep {
    /// `nvme list`
    NvmeList,
    /// `nvme id-ctrl`
    NvmeIdCtrl,
    /// `nvme id-ns -n 1`
    NvmeIdNs,
    /// `nvme ns-descs -n 1`
    NvmeNsDescs,
    /// `nvme show-regs`
    NvmeShowRegs,
    /// `nvme fw-log`
    NvmeFwLog,
    /// `nvme smart-log`
    NvmeSmartLog,
    /// `nvme error-log -e N`
    NvmeErrorLog,
}

impl DiagnosticStep {
    /// Every step, in execution order.
    pub const ALL: [DiagnosticStep; 8] = [
        Self::NvmeList,
        Self::NvmeIdCtrl,
        Self::NvmeIdNs,
        Self::NvmeNsDescs,
        Self::NvmeShowRegs,
        Self::NvmeFwLog,
        Self::NvmeSmartLog,
        Self::NvmeErrorLog,
    ];

    /// Stable operation name, also used in failure codes and report file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::NvmeList => "nvme_list",
            Self::NvmeIdCtrl => "nvme_id_ctrl",
            Self::NvmeIdNs => "nvme_id_ns",
            Self::NvmeNsDescs => "nvme_ns_descs",
            Self::NvmeShowRegs => "nvme_show_regs",
            Self::NvmeFwLog => "nvme_fw_log",
            Self::NvmeSmartLog => "nvme_smart_log",
            Self::NvmeErrorLog => "nvme_error_log",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::NvmeList => "List all NVMe devices",
            Self::NvmeIdCtrl => "Get controller identification",
            Self::NvmeIdNs => "Get namespace identification",
            Self::NvmeNsDescs => "Get namespace descriptors",
            Self::NvmeShowRegs => "Display controller registers",
            Self::NvmeFwLog => "Get firmware log information",
            Self::NvmeSmartLog => "Get SMART/health information",
            Self::NvmeErrorLog => "Get error log entries",
        }
    }

    /// 1-based position in the sequence.
    pub fn index(self) -> usize {
        self as usize + 1
    }

    pub fn is_last(self) -> bool {
        self == Self::NvmeErrorLog
    }

    /// Parse an operation name (as returned by [`DiagnosticStep::name`]).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.name() == name)
    }
}

impl fmt::Display for DiagnosticStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
