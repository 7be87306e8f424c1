// SPDX-License-Identifier: GPL-3.0-only

//! The fixed catalog of diagnostic steps
//!
//! Each step pairs an nvme-cli invocation with the extraction rules for its
//! output. Rules list the legacy layout first and the current nvme-cli
//! layout as a fallback where the two differ.

use nvme_qual_types::{DiagnosticStep, FieldMap, FieldMapExt, FieldValue};
use tracing::warn;

use crate::extract::{Capture, Coercion, FieldRule, extract};
use crate::runner::Invocation;

pub const NVME_BINARY: &str = "nvme";

/// Namespace queried by the identify and descriptor steps.
pub const NAMESPACE_ID: u32 = 1;

pub const DEFAULT_ERROR_LOG_ENTRIES: u32 = 10;

/// Tunables that reach into step invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Number of most recent error-log entries to request.
    pub error_log_entries: u32,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            error_log_entries: DEFAULT_ERROR_LOG_ENTRIES,
        }
    }
}

const LIST_RULES: &[FieldRule] = &[FieldRule::group(
    "devices",
    r"(?m)^\s*(/dev/\S+)\s+(\S+)\s+(.*?)\s+(\S+)\s+(\S+)\s*$",
    &[
        Capture::new("node", 1, Coercion::Text),
        Capture::new("sn", 2, Coercion::Text),
        Capture::new("model", 3, Coercion::Text),
        Capture::new("namespace", 4, Coercion::Text),
        Capture::new("size", 5, Coercion::Text),
    ],
)];

const ID_CTRL_RULES: &[FieldRule] = &[
    FieldRule::hex("vid", r"(?i)\bvid\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("ssvid", r"(?i)\bssvid\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::text("fr", r"(?i)\bfr\s*:\s*([A-Za-z0-9._-]+)"),
    FieldRule::text("mn", r"(?i)\bmn\s*:\s*([^\n]+)"),
    FieldRule::text("sn", r"(?i)\bsn\s*:\s*([A-Za-z0-9]+)"),
    FieldRule::decimal("mdts", r"(?i)\bmdts\s*:\s*(\d+)\b"),
    FieldRule::hex("cntlid", r"(?i)\bcntlid\s*:\s*(?:0x)?([0-9a-f]+)\b"),
];

const ID_NS_RULES: &[FieldRule] = &[
    FieldRule::hex("nsze", r"(?i)\bnsze\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("ncap", r"(?i)\bncap\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("nuse", r"(?i)\bnuse\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::decimal("nlbaf", r"(?i)\bnlbaf\s*:\s*(\d+)\b"),
    FieldRule::group(
        "lba_formats",
        r"(?i)\blbaf\s*(\d+)\s*:\s*ms:(\d+)\s+lbads:(\d+)",
        &[
            Capture::new("format_id", 1, Coercion::Decimal),
            Capture::new("metadata_size", 2, Coercion::Decimal),
            Capture::new("lba_data_size", 3, Coercion::Decimal),
        ],
    ),
];

const NS_DESCS_RULES: &[FieldRule] = &[
    FieldRule::text("eui64", r"(?i)\beui64\s*:\s*([0-9a-f]+)"),
    FieldRule::text("nguid", r"(?i)\bnguid\s*:\s*([0-9a-f]+)"),
    FieldRule::text("uuid", r"(?i)\buuid\s*:\s*([0-9a-f-]+)"),
    FieldRule::hex("csi", r"(?i)\bcsi\s*:\s*(?:0x)?([0-9a-f]+)\b"),
];

const SHOW_REGS_RULES: &[FieldRule] = &[
    FieldRule::hex("cap", r"(?i)\bcap\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("vs", r"(?i)\bvs\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("cc", r"(?i)\bcc\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("csts", r"(?i)\bcsts\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("aqa", r"(?i)\baqa\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("lnksta", r"(?i)\blnksta\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("lnkcap", r"(?i)\blnkcap\s*:\s*(?:0x)?([0-9a-f]+)\b"),
];

const FW_LOG_RULES: &[FieldRule] = &[FieldRule::hex(
    "afi",
    r"(?i)\bafi\s*:\s*(?:0x)?([0-9a-f]+)\b",
)];

/// Firmware slot layouts. One log can mix them, so each layout adds the
/// slots that earlier layouts did not report.
const FW_SLOT_LAYOUTS: &[FieldRule] = &[
    // frs1 (Active) : 1B2QEXM7
    FieldRule::group(
        "firmware_slots",
        r"(?i)\bfrs(\d+)\s*\(([^)]*)\)\s*:\s*([A-Za-z0-9._-]+)",
        &[
            Capture::new("slot", 1, Coercion::Decimal),
            Capture::new("status", 2, Coercion::Text),
            Capture::new("version", 3, Coercion::Text),
        ],
    ),
    // frs1 : 0x374d413251584235 (5B2QGXA7)
    FieldRule::group(
        "firmware_slots",
        r"(?i)\bfrs(\d+)\s*:\s*0x[0-9a-f]+\s*\(([^)]*)\)",
        &[
            Capture::new("slot", 1, Coercion::Decimal),
            Capture::new("version", 2, Coercion::Text),
        ],
    ),
    // frs2 : 1B2QEXM5
    FieldRule::group(
        "firmware_slots",
        r"(?im)\bfrs(\d+)\s*:\s*([A-Za-z0-9._-]+)\s*$",
        &[
            Capture::new("slot", 1, Coercion::Decimal),
            Capture::new("version", 2, Coercion::Text),
        ],
    ),
];

const SMART_LOG_RULES: &[FieldRule] = &[
    FieldRule::hex("critical_warning", r"(?i)\bcritical_warning\s*:\s*0x([0-9a-f]+)"),
    FieldRule::decimal("critical_warning", r"(?i)\bcritical_warning\s*:\s*(\d+)\b"),
    FieldRule::decimal("temperature", r"(?i)\btemperature\s*:\s*(\d+)"),
    FieldRule::decimal("avail_spare", r"(?i)\bavail_spare\s*:\s*(\d+)%"),
    FieldRule::decimal("avail_spare", r"(?i)\bavailable_spare\s*:\s*(\d+)%"),
    FieldRule::decimal("spare_thresh", r"(?i)\bspare_thresh\s*:\s*(\d+)%"),
    FieldRule::decimal("spare_thresh", r"(?i)\bavailable_spare_threshold\s*:\s*(\d+)%"),
    FieldRule::decimal("percent_used", r"(?i)\bpercent_used\s*:\s*(\d+)%"),
    FieldRule::decimal("percent_used", r"(?i)\bpercentage_used\s*:\s*(\d+)%"),
    FieldRule::decimal("media_errors", r"(?i)\bmedia_errors\s*:\s*([\d,]+)"),
    FieldRule::decimal("num_err_log_entries", r"(?i)\bnum_err_log_entries\s*:\s*([\d,]+)"),
    FieldRule::decimal("power_cycles", r"(?i)\bpower_cycles\s*:\s*([\d,]+)"),
    FieldRule::decimal("power_on_hours", r"(?i)\bpower_on_hours\s*:\s*([\d,]+)"),
];

const ERROR_ENTRY_FIELDS: &[FieldRule] = &[
    FieldRule::decimal("error_count", r"(?i)\berror_count\s*:\s*(\d+)\b"),
    FieldRule::decimal("sqid", r"(?i)\bsqid\s*:\s*(\d+)\b"),
    FieldRule::hex("cmdid", r"(?i)\bcmdid\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("status_field", r"(?i)\bstatus_field\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::hex("lba", r"(?i)\blba\s*:\s*(?:0x)?([0-9a-f]+)\b"),
    FieldRule::decimal("nsid", r"(?i)\bnsid\s*:\s*(\d+)\b"),
    FieldRule::hex("nsid", r"(?i)\bnsid\s*:\s*0x([0-9a-f]+)"),
];

const ERROR_LOG_RULES: &[FieldRule] = &[
    FieldRule::sections(
        "error_entries",
        r"(?i)Error Log Entry\s*(\d+)\s*:",
        &[Capture::new("entry_number", 1, Coercion::Decimal)],
        ERROR_ENTRY_FIELDS,
    ),
    FieldRule::sections(
        "error_entries",
        r"(?i)\bEntry\[\s*(\d+)\s*\]",
        &[Capture::new("entry_number", 1, Coercion::Decimal)],
        ERROR_ENTRY_FIELDS,
    ),
];

/// Static description of one catalog step.
#[derive(Debug, Clone, Copy)]
pub struct StepDescriptor {
    pub step: DiagnosticStep,
    pub rules: &'static [FieldRule],
}

impl StepDescriptor {
    pub fn for_step(step: DiagnosticStep) -> Self {
        let rules = match step {
            DiagnosticStep::NvmeList => LIST_RULES,
            DiagnosticStep::NvmeIdCtrl => ID_CTRL_RULES,
            DiagnosticStep::NvmeIdNs => ID_NS_RULES,
            DiagnosticStep::NvmeNsDescs => NS_DESCS_RULES,
            DiagnosticStep::NvmeShowRegs => SHOW_REGS_RULES,
            DiagnosticStep::NvmeFwLog => FW_LOG_RULES,
            DiagnosticStep::NvmeSmartLog => SMART_LOG_RULES,
            DiagnosticStep::NvmeErrorLog => ERROR_LOG_RULES,
        };
        Self { step, rules }
    }

    /// All eight steps, in execution order.
    pub fn catalog() -> [Self; 8] {
        DiagnosticStep::ALL.map(Self::for_step)
    }

    pub fn name(&self) -> &'static str {
        self.step.name()
    }

    pub fn description(&self) -> &'static str {
        self.step.description()
    }

    pub fn invocation(&self, device: &str, options: &CatalogOptions) -> Invocation {
        let namespace = NAMESPACE_ID.to_string();
        let args: Vec<String> = match self.step {
            DiagnosticStep::NvmeList => vec!["list".into()],
            DiagnosticStep::NvmeIdCtrl => vec!["id-ctrl".into(), device.into()],
            DiagnosticStep::NvmeIdNs => {
                vec!["id-ns".into(), device.into(), "-n".into(), namespace]
            }
            DiagnosticStep::NvmeNsDescs => {
                vec!["ns-descs".into(), device.into(), "-n".into(), namespace]
            }
            DiagnosticStep::NvmeShowRegs => vec!["show-regs".into(), device.into()],
            DiagnosticStep::NvmeFwLog => vec!["fw-log".into(), device.into()],
            DiagnosticStep::NvmeSmartLog => vec!["smart-log".into(), device.into()],
            DiagnosticStep::NvmeErrorLog => vec![
                "error-log".into(),
                device.into(),
                "-e".into(),
                options.error_log_entries.to_string(),
            ],
        };
        Invocation::new(NVME_BINARY, args)
    }

    /// Extract this step's fields from `output` and add derived fields.
    pub fn parse(&self, output: &str, device: &str) -> FieldMap {
        let mut fields = extract(output, self.rules);
        match self.step {
            DiagnosticStep::NvmeList => derive_target_present(&mut fields, device),
            DiagnosticStep::NvmeFwLog => {
                collect_firmware_slots(&mut fields, output);
                derive_active_slot(&mut fields);
            }
            DiagnosticStep::NvmeErrorLog => derive_total_entries(&mut fields),
            DiagnosticStep::NvmeIdCtrl
            | DiagnosticStep::NvmeIdNs
            | DiagnosticStep::NvmeNsDescs
            | DiagnosticStep::NvmeShowRegs
            | DiagnosticStep::NvmeSmartLog => {}
        }
        fields
    }
}

fn derive_target_present(fields: &mut FieldMap, device: &str) {
    let present = fields.group("devices").is_some_and(|devices| {
        devices
            .iter()
            .filter_map(|entry| entry.text("node"))
            .any(|node| node.contains(device))
    });
    fields.insert("target_device_present".to_string(), FieldValue::Flag(present));
}

fn collect_firmware_slots(fields: &mut FieldMap, output: &str) {
    let mut slots: Vec<FieldMap> = Vec::new();
    for layout in FW_SLOT_LAYOUTS {
        let entries = match layout.apply(output) {
            Ok(Some(FieldValue::Group(entries))) => entries,
            Ok(_) => continue,
            Err(error) => {
                warn!("Skipping firmware slot layout: {error}");
                continue;
            }
        };
        for entry in entries {
            let reported = entry
                .int("slot")
                .is_some_and(|number| slots.iter().any(|slot| slot.int("slot") == Some(number)));
            if !reported {
                slots.push(entry);
            }
        }
    }
    slots.sort_by_key(|slot| slot.int("slot"));
    fields.insert("firmware_slots".to_string(), FieldValue::Group(slots));
}

/// Marks each slot active and records the last active slot number.
///
/// A slot is active when its status text says so; for the layout without
/// status text, the low three bits of `afi` name the running slot.
fn derive_active_slot(fields: &mut FieldMap) {
    let running_slot = fields.int("afi").map(|afi| afi & 0x7);
    let mut active_slot = None;
    if let Some(FieldValue::Group(slots)) = fields.get_mut("firmware_slots") {
        for slot in slots.iter_mut() {
            let number = slot.int("slot");
            let active = match slot.text("status") {
                Some(status) => status.contains("Active"),
                None => number.is_some() && number == running_slot,
            };
            if active {
                active_slot = number;
            }
            slot.insert("active".to_string(), FieldValue::Flag(active));
        }
    }
    if let Some(slot) = active_slot {
        fields.insert("active_slot".to_string(), FieldValue::Int(slot));
    }
}

fn derive_total_entries(fields: &mut FieldMap) {
    let total = fields.group("error_entries").map_or(0, <[FieldMap]>::len);
    fields.insert("total_entries".to_string(), FieldValue::Int(total as u64));
}
