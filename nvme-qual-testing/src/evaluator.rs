// SPDX-License-Identifier: GPL-3.0-only

//! Pass/fail criteria over a completed set of step results
//!
//! Evaluation is a pure function of the profile and the results: the same
//! inputs always produce the same findings and failure codes.

use std::collections::BTreeMap;

use nvme_qual_types::{
    AnalysisFinding, CommandResult, ControllerConfig, ControllerStatus, Criterion, CriticalWarning,
    DeviceProfile, DiagnosticStep, FailureCode, FieldMapExt, LinkStatus, TestVerdict, Verdict,
};
use serde_json::json;
use tracing::{info, warn};

use crate::sequencer::StepResults;

/// Percent-used at or above which the device counts as worn out.
pub const HIGH_WEAR_PERCENT: u64 = 90;

/// Critical-warning bits that fail the SMART criterion, in reporting order.
/// Bit 1 (temperature threshold) is deliberately absent.
const FAILING_WARNINGS: [(CriticalWarning, FailureCode); 4] = [
    (CriticalWarning::AvailableSpareLow, FailureCode::SmartAvailableSpareLow),
    (CriticalWarning::NvmSubsystemDegraded, FailureCode::SmartNvmSubsystemDegraded),
    (CriticalWarning::MediaReadOnly, FailureCode::SmartMediaReadOnly),
    (CriticalWarning::VolatileBackupFailed, FailureCode::SmartVolatileBackupFailed),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub findings: BTreeMap<Criterion, AnalysisFinding>,
    /// Codes of every criterion, in criterion order.
    pub failure_reasons: Vec<FailureCode>,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        self.failure_reasons.is_empty()
    }
}

fn successful(result: Option<&CommandResult>) -> Option<&CommandResult> {
    result.filter(|result| result.success)
}

pub fn evaluate_smart(profile: &DeviceProfile, result: Option<&CommandResult>) -> AnalysisFinding {
    let mut finding = AnalysisFinding::new(Criterion::Smart);
    let Some(result) = successful(result) else {
        finding.fail(FailureCode::SmartDataUnavailable);
        return finding;
    };
    let fields = &result.parsed;

    let Some(raw_warning) = fields.int("critical_warning") else {
        warn!("SMART log has no critical_warning field");
        finding.fail(FailureCode::SmartDataUnavailable);
        return finding;
    };

    let warnings = CriticalWarning::decode(raw_warning);
    finding.record("critical_warning", raw_warning);
    finding.record(
        "critical_warnings",
        warnings.iter().map(CriticalWarning::name).collect::<Vec<_>>(),
    );
    for (flag, code) in FAILING_WARNINGS {
        if warnings.contains(flag) {
            finding.fail(code);
        }
    }
    let thermal = warnings.contains(CriticalWarning::TemperatureThreshold);
    finding.record("thermal_warning", thermal);
    if thermal {
        warn!("SMART thermal warning detected (allowed)");
    }

    let media_errors = fields.int("media_errors").unwrap_or(0);
    finding.record("media_error_count", media_errors);
    if media_errors > 0 {
        finding.fail(FailureCode::SmartMediaErrors(media_errors));
    }

    let percent_used = fields.int("percent_used").unwrap_or(0);
    finding.record("percent_used", percent_used);
    if percent_used >= HIGH_WEAR_PERCENT {
        finding.fail(FailureCode::SmartHighWearLevel);
    }

    let available_spare = fields.int("avail_spare").unwrap_or(100);
    let spare_threshold = fields.int("spare_thresh").unwrap_or(10);
    finding.record("available_spare", available_spare);
    finding.record("spare_threshold", spare_threshold);
    if available_spare < spare_threshold {
        finding.fail(FailureCode::SmartSpareBelowThreshold);
    }

    if let Some(temperature) = fields.int("temperature") {
        finding.record("temperature", temperature);
        if temperature > profile.smart.max_temperature {
            warn!(
                "Temperature {temperature} exceeds {} profile maximum {}",
                profile.key, profile.smart.max_temperature
            );
        }
    }

    finding
}

pub fn evaluate_pcie(profile: &DeviceProfile, result: Option<&CommandResult>) -> AnalysisFinding {
    let mut finding = AnalysisFinding::new(Criterion::PcieLink);
    let expected = profile.pcie;
    finding.record("expected_width", expected.width);
    finding.record("expected_speed", expected.speed);

    let Some(result) = successful(result) else {
        finding.fail(FailureCode::PcieRegisterDataUnavailable);
        return finding;
    };

    let Some(raw) = result.parsed.int("lnksta") else {
        warn!("PCIe LNKSTA register not found in register dump");
        finding.fail(FailureCode::PcieLnkstaRegisterNotFound);
        return finding;
    };

    let link = LinkStatus::decode(raw);
    let (width, speed) = (link.width(), link.speed());
    finding.record("lnksta", link.raw());
    finding.record("actual_width", width);
    finding.record("actual_speed", speed);

    if width != expected.width {
        finding.fail(FailureCode::PcieLinkWidthMismatch {
            expected: expected.width,
            actual: width,
        });
    }
    // A link faster than expected is acceptable.
    if speed < expected.speed {
        finding.fail(FailureCode::PcieLinkSpeedBelowExpected {
            expected: expected.speed,
            actual: speed,
        });
    }

    finding
}

pub fn evaluate_commands(results: &StepResults) -> AnalysisFinding {
    let mut finding = AnalysisFinding::new(Criterion::CommandExecution);
    let mut successful_commands = 0usize;
    let mut failed_commands = 0usize;
    let mut timeout_commands = 0usize;
    let mut details = Vec::new();
    let mut missing = Vec::new();

    for step in DiagnosticStep::ALL {
        let Some(result) = results.get(&step) else {
            missing.push(step.name());
            finding.fail(FailureCode::CommandResponseFail(step));
            continue;
        };
        if result.success {
            successful_commands += 1;
            continue;
        }

        failed_commands += 1;
        if result.is_timeout() {
            timeout_commands += 1;
            finding.fail(FailureCode::CommandTimeout(step));
        } else {
            finding.fail(FailureCode::CommandResponseFail(step));
        }
        details.push(json!({
            "command": step.name(),
            "error_message": result.error_message(),
            "return_code": result.exit_code,
            "execution_time": result.execution_secs,
        }));
    }

    finding.record("total_commands", results.len());
    finding.record("successful_commands", successful_commands);
    finding.record("failed_commands", failed_commands);
    finding.record("timeout_commands", timeout_commands);
    finding.record("failed_command_details", details);
    if !missing.is_empty() {
        warn!("Incomplete result set, missing: {}", missing.join(", "));
        finding.record("missing_commands", missing);
    }

    finding
}

pub fn evaluate_firmware(result: Option<&CommandResult>) -> AnalysisFinding {
    let mut finding = AnalysisFinding::new(Criterion::FirmwareHealth);
    let Some(result) = successful(result) else {
        finding.fail(FailureCode::FirmwareHealthDataUnavailable);
        return finding;
    };

    let Some(raw) = result.parsed.int("csts") else {
        finding.fail(FailureCode::FirmwareCstsRegisterNotFound);
        return finding;
    };

    let status = ControllerStatus::decode(raw);
    finding.record("csts_register", status.raw());
    finding.record("fatal_error", status.fatal());
    finding.record("controller_ready", status.ready());
    if status.fatal() {
        finding.fail(FailureCode::FirmwareFatalErrorCstsCfs);
    }
    if !status.ready() {
        finding.fail(FailureCode::FirmwareControllerNotReady);
    }

    if let Some(cc) = result.parsed.int("cc") {
        let enabled = ControllerConfig::decode(cc).enabled();
        finding.record("controller_enabled", enabled);
        if !enabled {
            warn!("Controller not enabled (CC.EN=0)");
        }
    }

    finding
}

/// Apply all four criteria.
pub fn evaluate(profile: &DeviceProfile, results: &StepResults) -> Evaluation {
    let registers = results.get(&DiagnosticStep::NvmeShowRegs);
    let findings: BTreeMap<Criterion, AnalysisFinding> = [
        evaluate_smart(profile, results.get(&DiagnosticStep::NvmeSmartLog)),
        evaluate_pcie(profile, registers),
        evaluate_commands(results),
        evaluate_firmware(registers),
    ]
    .into_iter()
    .map(|finding| (finding.criterion(), finding))
    .collect();

    let failure_reasons = findings
        .values()
        .flat_map(|finding| finding.failure_codes().iter().cloned())
        .collect();

    Evaluation {
        findings,
        failure_reasons,
    }
}

/// Evaluate a completed run and assemble its verdict.
pub fn judge(profile: &DeviceProfile, results: StepResults, execution_secs: f64) -> TestVerdict {
    let evaluation = evaluate(profile, &results);
    let status = if evaluation.passed() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let commands_executed = results.len();
    let commands_passed = results.values().filter(|result| result.success).count();
    let raw_outputs = results
        .iter()
        .map(|(step, result)| (*step, result.raw_output.clone()))
        .collect();

    info!(
        "Verdict {status}: {commands_passed}/{commands_executed} steps passed, {} failure code(s)",
        evaluation.failure_reasons.len()
    );

    TestVerdict {
        status,
        commands_executed,
        commands_passed,
        commands_failed: commands_executed - commands_passed,
        failure_reasons: evaluation.failure_reasons,
        findings: evaluation.findings,
        execution_secs,
        raw_outputs,
    }
}
