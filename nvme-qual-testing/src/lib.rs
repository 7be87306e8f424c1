// SPDX-License-Identifier: GPL-3.0-only

//! NVMe SSD qualification engine
//!
//! Runs the fixed diagnostic catalog against one device through a
//! [`nvme_qual_sys::CommandRunner`], judges the results against the
//! device-type profile and writes the run's reports.

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod logging;
pub mod report;
pub mod sequencer;

pub use config::{ConfigOverrides, DEFAULT_CONFIG_FILE, LoggingLevel, QualConfig, RunMode};
pub use errors::{QualError, Result};
pub use evaluator::{Evaluation, evaluate, judge};
pub use report::{ReportFiles, ReportWriter, RunMetadata};
pub use sequencer::{
    RunContext, SequenceOutcome, Sequencer, SequencerState, StepResults, plan, qualify,
};
