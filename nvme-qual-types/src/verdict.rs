// SPDX-License-Identifier: GPL-3.0-only

//! Criterion findings and the terminal qualification verdict

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::codes::FailureCode;
use crate::step::DiagnosticStep;

/// Pass/fail criterion categories, in evaluation (and reporting) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Smart,
    PcieLink,
    CommandExecution,
    FirmwareHealth,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Self::Smart,
        Self::PcieLink,
        Self::CommandExecution,
        Self::FirmwareHealth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::PcieLink => "pcie_link",
            Self::CommandExecution => "command_execution",
            Self::FirmwareHealth => "firmware_health",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one criterion.
///
/// `failed` is maintained by [`AnalysisFinding::fail`] and is true exactly
/// when at least one failure code has been recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFinding {
    criterion: Criterion,
    failed: bool,
    failure_codes: Vec<FailureCode>,
    values: BTreeMap<String, Value>,
}

impl AnalysisFinding {
    pub fn new(criterion: Criterion) -> Self {
        Self {
            criterion,
            failed: false,
            failure_codes: Vec::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn fail(&mut self, code: FailureCode) {
        self.failure_codes.push(code);
        self.failed = true;
    }

    /// Record a category-specific value (e.g. the decoded link width).
    pub fn record(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn failure_codes(&self) -> &[FailureCode] {
        &self.failure_codes
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal artifact of a qualification run, handed to the report writers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestVerdict {
    pub status: Verdict,
    pub commands_executed: usize,
    pub commands_passed: usize,
    pub commands_failed: usize,
    /// Failure codes of every criterion, in criterion order.
    pub failure_reasons: Vec<FailureCode>,
    pub findings: BTreeMap<Criterion, AnalysisFinding>,
    pub execution_secs: f64,
    pub raw_outputs: BTreeMap<DiagnosticStep, String>,
}

impl TestVerdict {
    /// Verdict of a run that stopped before any diagnostic step ran.
    pub fn aborted(reason: FailureCode, execution_secs: f64) -> Self {
        Self {
            status: Verdict::Fail,
            commands_executed: 0,
            commands_passed: 0,
            commands_failed: 0,
            failure_reasons: vec![reason],
            findings: BTreeMap::new(),
            execution_secs,
            raw_outputs: BTreeMap::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == Verdict::Pass
    }

    /// Process exit status for this verdict: PASS=0, FAIL=1.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }

    pub fn finding(&self, criterion: Criterion) -> Option<&AnalysisFinding> {
        self.findings.get(&criterion)
    }

    /// Share of executed steps that succeeded, in percent.
    pub fn success_rate_percent(&self) -> f64 {
        if self.commands_executed == 0 {
            0.0
        } else {
            self.commands_passed as f64 / self.commands_executed as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_fails_iff_codes_recorded() {
        let mut finding = AnalysisFinding::new(Criterion::Smart);
        finding.record("media_error_count", 0);
        assert!(!finding.failed());
        assert!(finding.failure_codes().is_empty());

        finding.fail(FailureCode::SmartHighWearLevel);
        assert!(finding.failed());
        assert_eq!(finding.failure_codes(), &[FailureCode::SmartHighWearLevel]);
    }

    #[test]
    fn aborted_verdict_fails_with_single_reason() {
        let verdict = TestVerdict::aborted(FailureCode::PreconditionDeviceNotFound, 0.1);
        assert_eq!(verdict.status, Verdict::Fail);
        assert_eq!(verdict.exit_code(), 1);
        assert_eq!(verdict.failure_reasons.len(), 1);
        assert_eq!(verdict.commands_executed, 0);
        assert_eq!(verdict.success_rate_percent(), 0.0);
    }

    #[test]
    fn criteria_order_matches_reporting_order() {
        let mut sorted = Criterion::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Criterion::ALL.to_vec());
    }
}
