// SPDX-License-Identifier: GPL-3.0-only

//! Full qualification runs against canned nvme-cli output.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use nvme_qual_sys::{CommandRunner, Invocation};
use nvme_qual_testing::{QualConfig, ReportWriter, RunContext, RunMetadata, SequenceOutcome, Sequencer};
use nvme_qual_types::{
    CommandResult, Criterion, DiagnosticStep, FieldMapExt, FieldValue, TestVerdict, Verdict,
};

const DEVICE: &str = "/dev/nvme0n1";

const LIST: &str = "\
Node             SN               Model                          Namespace  Usage
---------------- ---------------- ------------------------------ ---------  --------
/dev/nvme0n1     S5GXNF0R123456   Bravo Enterprise SSD 1TB       1          1.00TB
";

const ID_CTRL: &str = "\
NVME Identify Controller:
vid       : 0x144d
ssvid     : 0x144d
sn        : S5GXNF0R123456
mn        : Bravo Enterprise SSD 1TB
fr        : 2B2QEXM7
mdts      : 9
cntlid    : 0x4
";

const ID_NS: &str = "\
NVME Identify Namespace 1:
nsze    : 0x74706db0
ncap    : 0x74706db0
nuse    : 0x1a2b3c
nlbaf   : 0
lbaf  0 : ms:0   lbads:9  rp:0 (in use)
";

const NS_DESCS: &str = "\
NVME Namespace Identification Descriptors NS 1:
eui64   : 002538b511b0a1c2
nguid   : 002538b511b0a1c2000000000000000a
csi     : 0
";

const SHOW_REGS: &str = "\
cap     : 0x2014030fff
vs      : 0x10300
cc      : 0x460001
csts    : 0x1
aqa     : 0x1f001f
lnkcap  : 0x44
lnksta  : 0x43
";

const FW_LOG: &str = "\
Firmware Log for device:nvme0
afi  : 0x1
frs1 (Active) : 2B2QEXM7
frs2 : 1B2QEXM7
";

const SMART_LOG: &str = "\
Smart Log for NVME device:nvme0 namespace-id:ffffffff
critical_warning                        : 0
temperature                             : 35 C
available_spare                         : 100%
available_spare_threshold               : 10%
percentage_used                         : 2%
media_errors                            : 0
num_err_log_entries                     : 0
power_cycles                            : 1,024
power_on_hours                          : 12,345
";

const ERROR_LOG: &str = "\
Error Log Entries for device:nvme0 entries:10
.................
 Entry[ 0]
.................
error_count     : 2
sqid            : 0
cmdid           : 0x1a
status_field    : 0x4004
lba             : 0
nsid            : 0x1
.................
 Entry[ 1]
.................
error_count     : 1
sqid            : 2
cmdid           : 0x7
status_field    : 0x4004
lba             : 0x100
nsid            : 0x1
";

/// Answers each nvme subcommand from a table of canned outputs.
#[derive(Clone)]
struct CannedRunner {
    outputs: HashMap<&'static str, String>,
    timeouts: Vec<&'static str>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl CannedRunner {
    fn healthy() -> Self {
        let outputs = [
            ("list", LIST),
            ("id-ctrl", ID_CTRL),
            ("id-ns", ID_NS),
            ("ns-descs", NS_DESCS),
            ("show-regs", SHOW_REGS),
            ("fw-log", FW_LOG),
            ("smart-log", SMART_LOG),
            ("error-log", ERROR_LOG),
        ]
        .into_iter()
        .map(|(subcommand, output)| (subcommand, output.to_string()))
        .collect();
        Self {
            outputs,
            timeouts: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_output(mut self, subcommand: &'static str, output: impl Into<String>) -> Self {
        self.outputs.insert(subcommand, output.into());
        self
    }

    fn with_timeout(mut self, subcommand: &'static str) -> Self {
        self.timeouts.push(subcommand);
        self
    }

    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

#[async_trait]
impl CommandRunner for CannedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        _description: &str,
        timeout: Duration,
    ) -> nvme_qual_sys::Result<CommandResult> {
        let rendered = invocation.render();
        self.calls.lock().unwrap().push(rendered.clone());
        let subcommand = invocation.args.first().map(String::as_str).unwrap_or("");
        if self.timeouts.iter().any(|timed_out| *timed_out == subcommand) {
            return Ok(CommandResult::timed_out(rendered, timeout));
        }
        let stdout = self.outputs.get(subcommand).cloned().unwrap_or_default();
        Ok(CommandResult::succeeded(
            rendered,
            stdout,
            Duration::from_millis(5),
        ))
    }
}

/// Replace the line starting with `key` in a canned output.
fn with_line(output: &str, key: &str, line: &str) -> String {
    output
        .lines()
        .map(|current| if current.starts_with(key) { line } else { current })
        .collect::<Vec<_>>()
        .join("\n")
}

fn present(_: &Path) -> bool {
    true
}

fn context(config: &QualConfig) -> RunContext {
    config.run_context().unwrap()
}

fn quiet_config() -> QualConfig {
    QualConfig {
        step_delay_ms: 0,
        ..QualConfig::default()
    }
}

async fn qualify_with(context: &RunContext, runner: &CannedRunner) -> TestVerdict {
    Sequencer::new(context, runner)
        .with_device_probe(present)
        .run()
        .await
        .into_verdict(&context.profile)
}

#[tokio::test]
async fn healthy_drive_passes_every_criterion() {
    let config = quiet_config();
    let context = context(&config);
    let runner = CannedRunner::healthy();

    assert_eq!(context.device, DEVICE);
    let verdict = qualify_with(&context, &runner).await;

    assert_eq!(verdict.status, Verdict::Pass, "{:?}", verdict.failure_reasons);
    assert_eq!(verdict.exit_code(), 0);
    assert_eq!(verdict.commands_executed, 8);
    assert_eq!(verdict.commands_passed, 8);
    assert!(verdict.failure_reasons.is_empty());
    assert_eq!(verdict.raw_outputs.len(), 8);

    let pcie = verdict.finding(Criterion::PcieLink).unwrap();
    assert_eq!(pcie.value("actual_width"), Some(&4.into()));
    assert_eq!(pcie.value("actual_speed"), Some(&3.into()));
    let smart = verdict.finding(Criterion::Smart).unwrap();
    assert_eq!(smart.value("temperature"), Some(&35.into()));
    assert_eq!(smart.value("available_spare"), Some(&100.into()));

    let calls = runner.take_calls();
    assert_eq!(calls.len(), 10);
    assert_eq!(calls.last().unwrap(), "nvme error-log /dev/nvme0n1 -e 10");
}

#[tokio::test]
async fn steps_expose_parsed_fields() {
    let config = quiet_config();
    let context = context(&config);
    let runner = CannedRunner::healthy();

    let SequenceOutcome::Completed { results, .. } = Sequencer::new(&context, &runner)
        .with_device_probe(present)
        .run()
        .await
    else {
        panic!("healthy drive should not abort");
    };

    let list = &results[&DiagnosticStep::NvmeList].parsed;
    assert_eq!(list.flag("target_device_present"), Some(true));

    let id_ctrl = &results[&DiagnosticStep::NvmeIdCtrl].parsed;
    assert_eq!(id_ctrl.int("vid"), Some(0x144d));
    assert_eq!(id_ctrl.text("mn"), Some("Bravo Enterprise SSD 1TB"));

    let ns_descs = &results[&DiagnosticStep::NvmeNsDescs].parsed;
    assert_eq!(ns_descs.int("csi"), Some(0));

    let fw = &results[&DiagnosticStep::NvmeFwLog].parsed;
    assert_eq!(fw.int("active_slot"), Some(1));
    let slots = fw.group("firmware_slots").unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[1].text("version"), Some("1B2QEXM7"));

    let smart = &results[&DiagnosticStep::NvmeSmartLog].parsed;
    assert_eq!(smart.int("power_on_hours"), Some(12_345));
    assert_eq!(smart.int("spare_thresh"), Some(10));

    let errors = &results[&DiagnosticStep::NvmeErrorLog].parsed;
    assert_eq!(errors.int("total_entries"), Some(2));
    let entries = errors.group("error_entries").unwrap();
    assert_eq!(entries[0].int("lba"), Some(0));
    assert_eq!(entries[1].int("cmdid"), Some(0x7));
    assert_eq!(entries[1].get("nsid"), Some(&FieldValue::Int(1)));
}

#[tokio::test]
async fn degraded_drive_fails_with_ordered_reasons() {
    let config = quiet_config();
    let context = context(&config);
    let runner = CannedRunner::healthy()
        .with_output("smart-log", with_line(SMART_LOG, "media_errors", "media_errors : 3"))
        .with_output("show-regs", with_line(SHOW_REGS, "lnksta", "lnksta  : 0x23"));

    let verdict = qualify_with(&context, &runner).await;

    assert_eq!(verdict.status, Verdict::Fail);
    assert_eq!(verdict.exit_code(), 1);
    let reasons: Vec<String> = verdict.failure_reasons.iter().map(ToString::to_string).collect();
    assert_eq!(
        reasons,
        ["SMART_MEDIA_ERRORS_3", "PCIE_LINK_WIDTH_MISMATCH_EXPECTED_x4_ACTUAL_x2"]
    );
    assert_eq!(verdict.commands_failed, 0);
}

#[tokio::test]
async fn timed_out_step_is_reported_and_sequence_continues() {
    let config = quiet_config();
    let context = context(&config);
    let runner = CannedRunner::healthy().with_timeout("fw-log");

    let verdict = qualify_with(&context, &runner).await;

    assert_eq!(verdict.status, Verdict::Fail);
    assert_eq!(verdict.commands_executed, 8);
    assert_eq!(verdict.commands_failed, 1);
    let reasons: Vec<String> = verdict.failure_reasons.iter().map(ToString::to_string).collect();
    assert_eq!(reasons, ["COMMAND_TIMEOUT_NVME_FW_LOG"]);

    let commands = verdict.finding(Criterion::CommandExecution).unwrap();
    assert_eq!(commands.value("timeout_commands"), Some(&1.into()));
    assert!(verdict.raw_outputs[&DiagnosticStep::NvmeFwLog].is_empty());

    let calls = runner.take_calls();
    assert_eq!(calls.len(), 10);
}

#[tokio::test]
async fn unlisted_device_aborts_before_diagnostics() {
    let config = quiet_config();
    let context = context(&config);
    let runner = CannedRunner::healthy().with_output("list", LIST.replace("nvme0n1", "nvme1n1"));

    let verdict = qualify_with(&context, &runner).await;

    assert_eq!(verdict.status, Verdict::Fail);
    assert_eq!(verdict.commands_executed, 0);
    assert!(verdict.findings.is_empty());
    let reasons: Vec<String> = verdict.failure_reasons.iter().map(ToString::to_string).collect();
    assert_eq!(reasons, ["PRECONDITION_DEVICE_NOT_LISTED"]);
    assert_eq!(runner.take_calls(), ["nvme id-ns /dev/nvme0n1 -n 1", "nvme list"]);
}

#[tokio::test]
async fn device_type_overlay_changes_the_verdict() {
    let config = QualConfig {
        device_type: "delta".to_string(),
        ..quiet_config()
    };
    let context = context(&config);

    let verdict = qualify_with(&context, &CannedRunner::healthy()).await;

    let reasons: Vec<String> = verdict.failure_reasons.iter().map(ToString::to_string).collect();
    assert_eq!(
        reasons,
        [
            "PCIE_LINK_WIDTH_MISMATCH_EXPECTED_x8_ACTUAL_x4",
            "PCIE_LINK_SPEED_BELOW_EXPECTED_Gen4_ACTUAL_Gen3"
        ]
    );
}

#[tokio::test]
async fn reports_are_written_for_a_finished_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = QualConfig {
        output_dir: dir.path().to_path_buf(),
        quid: "Q-2031".to_string(),
        ..quiet_config()
    };
    let context = context(&config);
    let started = Local::now();

    let verdict = qualify_with(&context, &CannedRunner::healthy()).await;
    let mut metadata = RunMetadata::new(&config, started);
    metadata.end_time = Local::now();
    let files = ReportWriter::new(&config, &metadata).write_all(&verdict).unwrap();

    let raw_dir = files.raw_outputs_dir.unwrap();
    assert_eq!(std::fs::read_dir(&raw_dir).unwrap().count(), 8);
    let csv = std::fs::read_to_string(&files.summary_csv).unwrap();
    assert!(csv.lines().nth(1).unwrap().contains(",Q-2031,PASS,"));
    let text = std::fs::read_to_string(&files.text_report).unwrap();
    assert!(text.contains("Overall Result: PASS"));
    assert!(!text.contains("FAILURE ANALYSIS"));
    assert!(files.tds_json.is_file());
}
