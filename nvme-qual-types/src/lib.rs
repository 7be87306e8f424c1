// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for NVMe drive qualification
//!
//! These types are shared by every layer of the harness:
//!
//! - **nvme-qual-sys**: produces [`CommandResult`]s and [`FieldMap`]s from nvme-cli output
//! - **nvme-qual-testing**: sequences the diagnostic steps, evaluates criteria and
//!   emits the [`TestVerdict`] consumed by the report writers
//!
//! ## Flow
//!
//! `DiagnosticStep` → `CommandResult` (with parsed `FieldMap`) → `AnalysisFinding`
//! per `Criterion` → `TestVerdict`.

pub mod codes;
pub mod fields;
pub mod profile;
pub mod registers;
pub mod result;
pub mod step;
pub mod verdict;

pub use codes::FailureCode;
pub use fields::{FieldMap, FieldMapExt, FieldValue};
pub use profile::{BASELINE_PROFILE_KEY, DeviceProfile, PcieExpectation, SmartThresholds};
pub use registers::{
    ControllerConfig, ControllerStatus, CriticalWarning, CriticalWarningFlags, LinkStatus,
    generation_name,
};
pub use result::{CommandError, CommandResult, ErrorKind, EXCEPTION_EXIT_CODE, TIMEOUT_EXIT_CODE};
pub use step::DiagnosticStep;
pub use verdict::{AnalysisFinding, Criterion, TestVerdict, Verdict};
