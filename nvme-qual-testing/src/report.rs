// SPDX-License-Identifier: GPL-3.0-only

//! Persisted qualification reports
//!
//! One run writes, under the configured output directory and sharing one
//! timestamp: a JSON result document, a one-row CSV summary, the raw step
//! outputs, a plain-text report and a test-data-system integration file.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use nvme_qual_types::{Criterion, TestVerdict};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::{QualConfig, RunMode};
use crate::errors::{QualError, Result};

pub const TEST_NAME: &str = "linux_nvme_01_information_cmd";
pub const TEST_SUITE: &str = "linux_nvme_01";
pub const TEST_CASE: &str = "nvme_information_cmd";

/// Identity and timing of one run, shared by every report.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub device: String,
    pub device_type: String,
    pub quid: String,
    pub description: String,
    pub runmode: RunMode,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub log_file: Option<PathBuf>,
}

impl RunMetadata {
    pub fn new(config: &QualConfig, start_time: DateTime<Local>) -> Self {
        Self {
            device: config.device.clone(),
            device_type: config.device_type.clone(),
            quid: config.quid.clone(),
            description: config.description.clone(),
            runmode: config.runmode,
            start_time,
            end_time: start_time,
            log_file: None,
        }
    }

    /// File-name stamp shared by every artifact of the run.
    pub fn stamp(&self) -> String {
        file_stamp(&self.start_time)
    }
}

pub fn file_stamp(time: &DateTime<Local>) -> String {
    time.format("%Y%m%d_%H%M%S").to_string()
}

/// Paths of everything [`ReportWriter::write_all`] produced.
#[derive(Debug, Clone, Default)]
pub struct ReportFiles {
    pub results_json: PathBuf,
    pub summary_csv: PathBuf,
    pub raw_outputs_dir: Option<PathBuf>,
    pub text_report: PathBuf,
    pub tds_json: PathBuf,
}

pub struct ReportWriter<'a> {
    config: &'a QualConfig,
    metadata: &'a RunMetadata,
    output_dir: PathBuf,
    stamp: String,
}

impl<'a> ReportWriter<'a> {
    pub fn new(config: &'a QualConfig, metadata: &'a RunMetadata) -> Self {
        Self {
            config,
            metadata,
            output_dir: config.output_dir.clone(),
            stamp: metadata.stamp(),
        }
    }

    fn path(&self, prefix: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{prefix}_{}.{extension}", self.stamp))
    }

    pub fn write_all(&self, verdict: &TestVerdict) -> Result<ReportFiles> {
        create_dir(&self.output_dir)?;

        let results_json = self.write_json(verdict)?;
        let summary_csv = self.write_csv(verdict)?;
        let raw_outputs_dir = if self.config.save_raw_outputs {
            Some(self.write_raw_outputs(verdict)?)
        } else {
            None
        };
        let text_report = self.write_text(verdict)?;

        let mut deliverables = vec![results_json.clone(), summary_csv.clone(), text_report.clone()];
        if let Some(dir) = &raw_outputs_dir {
            deliverables.push(dir.clone());
        }
        let tds_json = self.write_tds(verdict, &deliverables)?;

        info!("Results saved to: {}", self.output_dir.display());
        Ok(ReportFiles {
            results_json,
            summary_csv,
            raw_outputs_dir,
            text_report,
            tds_json,
        })
    }

    pub fn write_json(&self, verdict: &TestVerdict) -> Result<PathBuf> {
        let path = self.path("nvme_test_results", "json");
        let metadata = self.metadata;
        let document = json!({
            "test_metadata": {
                "test_name": TEST_NAME,
                "test_version": env!("CARGO_PKG_VERSION"),
                "start_time": metadata.start_time.to_rfc3339(),
                "end_time": metadata.end_time.to_rfc3339(),
                "execution_time_seconds": verdict.execution_secs,
                "quid": metadata.quid,
                "device": metadata.device,
                "device_type": metadata.device_type,
                "runmode": metadata.runmode,
            },
            "test_results": {
                "overall_status": verdict.status,
                "commands_executed": verdict.commands_executed,
                "commands_passed": verdict.commands_passed,
                "commands_failed": verdict.commands_failed,
                "failure_reasons": verdict.failure_reasons,
            },
            "detailed_analysis": verdict.findings,
            "configuration": self.config,
        });
        write_json_file(&path, &document)?;
        debug!("JSON results saved: {}", path.display());
        Ok(path)
    }

    pub fn write_csv(&self, verdict: &TestVerdict) -> Result<PathBuf> {
        let path = self.path("nvme_test_summary", "csv");
        write_file(&path, &render_csv(self.metadata, verdict))?;
        debug!("CSV summary saved: {}", path.display());
        Ok(path)
    }

    /// One `<step>_output.txt` per executed step.
    pub fn write_raw_outputs(&self, verdict: &TestVerdict) -> Result<PathBuf> {
        let dir = self.output_dir.join(format!("raw_outputs_{}", self.stamp));
        create_dir(&dir)?;
        let rule = "=".repeat(80);
        for (step, output) in &verdict.raw_outputs {
            let contents = format!(
                "Command: {}\nTimestamp: {}\n{rule}\n{output}\n{rule}\n",
                step.name(),
                self.metadata.end_time.to_rfc3339(),
            );
            write_file(&dir.join(format!("{}_output.txt", step.name())), &contents)?;
        }
        debug!("Raw outputs saved: {}", dir.display());
        Ok(dir)
    }

    pub fn write_text(&self, verdict: &TestVerdict) -> Result<PathBuf> {
        let path = self.path("nvme_test_report", "txt");
        write_file(&path, &render_text(self.metadata, verdict))?;
        Ok(path)
    }

    pub fn write_tds(&self, verdict: &TestVerdict, deliverables: &[PathBuf]) -> Result<PathBuf> {
        let path = self.path("tds_integration", "json");
        let metadata = self.metadata;
        let document = json!({
            "qualification_id": metadata.quid,
            "test_suite": TEST_SUITE,
            "test_case": TEST_CASE,
            "device_under_test": {
                "device_path": metadata.device,
                "device_type": metadata.device_type,
                "description": metadata.description,
            },
            "execution_info": {
                "start_time": metadata.start_time.to_rfc3339(),
                "end_time": metadata.end_time.to_rfc3339(),
                "duration_seconds": verdict.execution_secs,
                "runmode": metadata.runmode,
            },
            "test_verdict": {
                "overall_result": verdict.status,
                "pass_criteria_met": verdict.is_pass(),
                "failure_reasons": verdict.failure_reasons,
            },
            "metrics": {
                "commands_total": verdict.commands_executed,
                "commands_passed": verdict.commands_passed,
                "commands_failed": verdict.commands_failed,
                "success_rate_percent": verdict.success_rate_percent(),
            },
            "deliverables": {
                "log_files": metadata.log_file.iter().collect::<Vec<_>>(),
                "result_files": deliverables,
                "raw_outputs_available": self.config.save_raw_outputs,
            },
        });
        write_json_file(&path, &document)?;
        debug!("TDS integration file saved: {}", path.display());
        Ok(path)
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|error| QualError::ReportIo {
        path: dir.to_path_buf(),
        reason: error.to_string(),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|error| QualError::ReportIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

fn write_json_file(path: &Path, document: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(document).map_err(|error| QualError::ReportIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    write_file(path, &content)
}

fn finding_value(verdict: &TestVerdict, criterion: Criterion, key: &str) -> String {
    match verdict.finding(criterion).and_then(|finding| finding.value(key)) {
        Some(Value::String(text)) => text.clone(),
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

/// Quote a CSV field when it holds a separator, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Header plus one data row.
pub fn render_csv(metadata: &RunMetadata, verdict: &TestVerdict) -> String {
    let reasons = verdict
        .failure_reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let pcie_validation = verdict
        .finding(Criterion::PcieLink)
        .map(|finding| (!finding.failed()).to_string())
        .unwrap_or_default();
    let smart_warnings = verdict
        .finding(Criterion::Smart)
        .map(|finding| finding.failed().to_string())
        .unwrap_or_default();

    let row: [(&str, String); 16] = [
        ("timestamp", metadata.end_time.to_rfc3339()),
        ("device", metadata.device.clone()),
        ("device_type", metadata.device_type.clone()),
        ("quid", metadata.quid.clone()),
        ("overall_status", verdict.status.to_string()),
        ("execution_time", format!("{:.3}", verdict.execution_secs)),
        ("commands_executed", verdict.commands_executed.to_string()),
        ("commands_passed", verdict.commands_passed.to_string()),
        ("commands_failed", verdict.commands_failed.to_string()),
        ("failure_count", verdict.failure_reasons.len().to_string()),
        ("failure_reasons", reasons),
        (
            "smart_media_errors",
            finding_value(verdict, Criterion::Smart, "media_error_count"),
        ),
        ("smart_critical_warnings", smart_warnings),
        (
            "pcie_width",
            finding_value(verdict, Criterion::PcieLink, "actual_width"),
        ),
        (
            "pcie_speed",
            finding_value(verdict, Criterion::PcieLink, "actual_speed"),
        ),
        ("pcie_validation", pcie_validation),
    ];

    let header = row.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(",");
    let values = row
        .iter()
        .map(|(_, value)| csv_field(value))
        .collect::<Vec<_>>()
        .join(",");
    format!("{header}\n{values}\n")
}

/// Human-readable report, also printed at the end of a run.
pub fn render_text(metadata: &RunMetadata, verdict: &TestVerdict) -> String {
    let mut out = String::new();
    let line = "=".repeat(72);

    out.push_str("NVMe Information Command Test Report\n");
    out.push_str(&line);
    out.push('\n');

    out.push_str("\nTEST SUMMARY:\n");
    out.push_str(&format!("  Device:         {}\n", metadata.device));
    out.push_str(&format!("  Device Type:    {}\n", metadata.device_type));
    if !metadata.quid.is_empty() {
        out.push_str(&format!("  QUID:           {}\n", metadata.quid));
    }
    out.push_str(&format!("  Overall Result: {}\n", verdict.status));
    out.push_str(&format!(
        "  Execution Time: {:.2} seconds\n",
        verdict.execution_secs
    ));

    out.push_str("\nCOMMAND EXECUTION SUMMARY:\n");
    out.push_str(&format!("  Total Commands: {}\n", verdict.commands_executed));
    out.push_str(&format!("  Passed:         {}\n", verdict.commands_passed));
    out.push_str(&format!("  Failed:         {}\n", verdict.commands_failed));

    if !verdict.failure_reasons.is_empty() {
        out.push_str("\nFAILURE ANALYSIS:\n");
        for reason in &verdict.failure_reasons {
            out.push_str(&format!("  - {reason}\n"));
        }
    }

    if !verdict.findings.is_empty() {
        out.push_str("\nDETAILED ANALYSIS:\n");
        for (criterion, finding) in &verdict.findings {
            let state = if finding.failed() { "FAIL" } else { "PASS" };
            out.push_str(&format!(
                "  {} [{state}]:\n",
                criterion.name().to_ascii_uppercase()
            ));
            for (key, value) in finding.values() {
                out.push_str(&format!("    {key}: {value}\n"));
            }
        }
    }

    out.push_str(&line);
    out.push('\n');
    out
}
