// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for NVMe qualification
//!
//! This crate talks to the outside world on behalf of the harness:
//! - Running nvme-cli invocations with a bounded wait ([`runner`])
//! - Pulling typed fields out of semi-structured tool output ([`extract`])
//! - The fixed catalog of diagnostic steps and their output schemas ([`catalog`])
//! - Device precondition probes ([`probe`])
//!
//! Nothing here knows about pass/fail policy.

pub mod catalog;
pub mod error;
pub mod extract;
pub mod probe;
pub mod runner;

pub use catalog::{
    CatalogOptions, DEFAULT_ERROR_LOG_ENTRIES, NAMESPACE_ID, NVME_BINARY, StepDescriptor,
};
pub use error::{Result, SysError};
pub use extract::{Capture, Coercion, FieldRule, RuleKind, extract};
pub use probe::{PROBE_TIMEOUT, device_readable, locate_nvme_cli};
pub use runner::{CommandRunner, Invocation, ProcessRunner};
