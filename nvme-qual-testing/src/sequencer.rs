// SPDX-License-Identifier: GPL-3.0-only

//! Ordered execution of the diagnostic catalog against one device
//!
//! ```text
//! NotStarted -> PreconditionCheck -> Aborted
//!                                 -> Running(1..8) -> Completed
//! ```
//!
//! A failed step never halts the sequence; every slot yields a result.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use nvme_qual_sys::probe::{check_listed, check_namespace};
use nvme_qual_sys::{CatalogOptions, CommandRunner, StepDescriptor, device_readable};
use nvme_qual_types::{CommandResult, DeviceProfile, DiagnosticStep, FailureCode, TestVerdict};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::evaluator;

/// Results keyed by step, iterated in execution order.
pub type StepResults = BTreeMap<DiagnosticStep, CommandResult>;

/// Explicit inputs of one qualification run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub device: String,
    pub profile: DeviceProfile,
    pub command_timeout: Duration,
    /// Pause between consecutive steps.
    pub step_delay: Duration,
    pub catalog: CatalogOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    NotStarted,
    PreconditionCheck,
    Running(DiagnosticStep),
    Aborted,
    Completed,
}

#[derive(Debug, Clone)]
pub enum SequenceOutcome {
    Aborted {
        reason: FailureCode,
        execution_secs: f64,
    },
    Completed {
        results: StepResults,
        execution_secs: f64,
    },
}

pub struct Sequencer<'a> {
    context: &'a RunContext,
    runner: &'a dyn CommandRunner,
    device_probe: fn(&Path) -> bool,
    state: SequencerState,
}

impl<'a> Sequencer<'a> {
    pub fn new(context: &'a RunContext, runner: &'a dyn CommandRunner) -> Self {
        Self {
            context,
            runner,
            device_probe: device_readable,
            state: SequencerState::NotStarted,
        }
    }

    /// Replace the device node check (exists and readable).
    pub fn with_device_probe(mut self, probe: fn(&Path) -> bool) -> Self {
        self.device_probe = probe;
        self
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub async fn check_preconditions(&mut self) -> Result<(), FailureCode> {
        self.state = SequencerState::PreconditionCheck;
        let device = self.context.device.as_str();
        info!("Checking preconditions for {device}");

        if !(self.device_probe)(Path::new(device)) {
            error!("Device {device} does not exist or is not readable");
            return Err(FailureCode::PreconditionDeviceNotFound);
        }
        if !check_namespace(self.runner, device).await {
            error!("Namespace 1 on {device} is not initialized");
            return Err(FailureCode::PreconditionNamespaceNotInitialized);
        }
        if !check_listed(self.runner, device).await {
            error!("Device {device} is not listed by nvme-cli");
            return Err(FailureCode::PreconditionDeviceNotListed);
        }

        debug!("Preconditions satisfied");
        Ok(())
    }

    /// Execute one step and parse its output. Never fails.
    pub async fn run_step(&self, step: DiagnosticStep) -> CommandResult {
        let descriptor = StepDescriptor::for_step(step);
        let invocation = descriptor.invocation(&self.context.device, &self.context.catalog);
        let started = Instant::now();

        let span = info_span!("step", name = step.name(), index = step.index());
        async {
            info!("{}", step.description());
            let result = match self
                .runner
                .run(&invocation, step.description(), self.context.command_timeout)
                .await
            {
                Ok(result) => result,
                Err(error) => {
                    error!("{} raised: {error}", step.name());
                    CommandResult::exception(
                        invocation.render(),
                        error.to_string(),
                        started.elapsed(),
                    )
                }
            };

            if result.success {
                let parsed = descriptor.parse(&result.raw_output, &self.context.device);
                info!(
                    "{} completed in {:.2}s ({} fields)",
                    step.name(),
                    result.execution_secs,
                    parsed.len()
                );
                result.with_parsed(parsed)
            } else {
                warn!("{} failed: {}", step.name(), result.error_message());
                result
            }
        }
        .instrument(span)
        .await
    }

    /// Drive the sequence to a terminal state.
    pub async fn run(mut self) -> SequenceOutcome {
        let started = Instant::now();

        if let Err(reason) = self.check_preconditions().await {
            self.state = SequencerState::Aborted;
            return SequenceOutcome::Aborted {
                reason,
                execution_secs: started.elapsed().as_secs_f64(),
            };
        }

        let mut results = StepResults::new();
        for step in DiagnosticStep::ALL {
            self.state = SequencerState::Running(step);
            let result = self.run_step(step).await;
            results.insert(step, result);

            if !step.is_last() && !self.context.step_delay.is_zero() {
                tokio::time::sleep(self.context.step_delay).await;
            }
        }

        self.state = SequencerState::Completed;
        let passed = results.values().filter(|result| result.success).count();
        info!("Sequence completed: {passed}/{} steps succeeded", results.len());

        SequenceOutcome::Completed {
            results,
            execution_secs: started.elapsed().as_secs_f64(),
        }
    }
}

impl SequenceOutcome {
    /// Judge the outcome. An aborted run fails with its single reason.
    pub fn into_verdict(self, profile: &DeviceProfile) -> TestVerdict {
        match self {
            Self::Aborted {
                reason,
                execution_secs,
            } => TestVerdict::aborted(reason, execution_secs),
            Self::Completed {
                results,
                execution_secs,
            } => evaluator::judge(profile, results, execution_secs),
        }
    }
}

/// Rendered invocations of every step, in execution order.
pub fn plan(context: &RunContext) -> Vec<String> {
    DiagnosticStep::ALL
        .into_iter()
        .map(|step| {
            StepDescriptor::for_step(step)
                .invocation(&context.device, &context.catalog)
                .render()
        })
        .collect()
}

/// Run the full qualification and judge it.
pub async fn qualify(context: &RunContext, runner: &dyn CommandRunner) -> TestVerdict {
    Sequencer::new(context, runner)
        .run()
        .await
        .into_verdict(&context.profile)
}
