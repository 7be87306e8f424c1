// SPDX-License-Identifier: GPL-3.0-only

//! nvme-qual - NVMe SSD information-command qualification

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use nvme_qual_sys::{ProcessRunner, StepDescriptor, locate_nvme_cli};
use nvme_qual_testing::report::{file_stamp, render_text};
use nvme_qual_testing::{
    ConfigOverrides, DEFAULT_CONFIG_FILE, LoggingLevel, QualConfig, QualError, ReportWriter,
    RunMetadata, RunMode, Sequencer, logging, plan, qualify,
};
use nvme_qual_types::{DeviceProfile, DiagnosticStep, generation_name};
use tracing::{error, info, warn};

/// Exit status for configuration, environment and report errors.
const SETUP_ERROR: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "nvme-qual", version)]
#[command(about = "Qualify an NVMe SSD with the nvme-cli information commands")]
struct QualCli {
    /// TOML configuration file; a missing file means defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: QualCommand,
}

#[derive(Debug, Subcommand)]
enum QualCommand {
    /// Run the full qualification sequence and write reports
    Run {
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// List the diagnostic catalog
    Steps,
    /// List the known device profiles
    Profiles,
    /// Execute one catalog step and print its parsed fields as JSON
    Step {
        /// Operation name, e.g. nvme_smart_log
        name: String,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

#[derive(Debug, Args)]
struct OverrideArgs {
    #[arg(long)]
    device: Option<String>,
    #[arg(long)]
    device_type: Option<String>,
    #[arg(long, value_enum)]
    runmode: Option<RunMode>,
    #[arg(long)]
    quid: Option<String>,
    #[arg(long, value_enum)]
    log_level: Option<LoggingLevel>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            device: args.device,
            device_type: args.device_type,
            runmode: args.runmode,
            quid: args.quid,
            log_level: args.log_level,
            output_dir: args.output_dir,
        }
    }
}

fn load_config(path: &Path, overrides: OverrideArgs) -> Result<QualConfig> {
    let mut config = QualConfig::load_or_default(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.apply_overrides(overrides.into());
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn warn_if_unprivileged() {
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root; nvme-cli admin commands may be refused");
    }
}

fn warn_if_fallback_profile(config: &QualConfig, profile: &DeviceProfile) {
    if config.uses_fallback_profile() {
        warn!(
            "Unknown device type '{}', using '{}' profile",
            config.device_type, profile.key
        );
    }
}

async fn run(config_path: PathBuf, overrides: OverrideArgs) -> Result<ExitCode> {
    let config = load_config(&config_path, overrides)?;
    let context = config.run_context()?;
    let started = Local::now();

    if config.runmode == RunMode::Dryrun {
        logging::init(config.effective_log_level(), None, &file_stamp(&started));
        warn_if_fallback_profile(&config, &context.profile);
        info!("Dry run for {} ({} profile)", context.device, context.profile.key);
        for (step, command) in DiagnosticStep::ALL.iter().zip(plan(&context)) {
            println!("[{}/{}] {command}", step.index(), DiagnosticStep::ALL.len());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let log_file = logging::init(
        config.effective_log_level(),
        Some(&config.output_dir),
        &file_stamp(&started),
    );
    warn_if_fallback_profile(&config, &context.profile);
    info!(
        "Starting nvme-qual v{} on {} ({} profile, runmode {})",
        env!("CARGO_PKG_VERSION"),
        context.device,
        context.profile.key,
        config.runmode.as_str()
    );

    let nvme = locate_nvme_cli().context("nvme-cli is required")?;
    info!("Using {}", nvme.display());
    warn_if_unprivileged();

    let runner = ProcessRunner::new();
    let verdict = qualify(&context, &runner).await;

    let mut metadata = RunMetadata::new(&config, started);
    metadata.end_time = Local::now();
    metadata.log_file = log_file;
    let files = ReportWriter::new(&config, &metadata)
        .write_all(&verdict)
        .context("writing reports")?;

    print!("{}", render_text(&metadata, &verdict));
    println!("Results: {}", files.results_json.display());

    if verdict.is_pass() {
        info!("Qualification PASSED");
    } else {
        let reasons: Vec<String> = verdict.failure_reasons.iter().map(ToString::to_string).collect();
        error!("Qualification FAILED: {}", reasons.join(", "));
    }
    Ok(ExitCode::from(verdict.exit_code() as u8))
}

async fn run_single_step(
    config_path: PathBuf,
    name: String,
    overrides: OverrideArgs,
) -> Result<ExitCode> {
    let step = DiagnosticStep::from_name(&name).ok_or(QualError::UnknownStep { name })?;
    let config = load_config(&config_path, overrides)?;
    logging::init(config.effective_log_level(), None, &file_stamp(&Local::now()));

    let context = config.run_context()?;
    warn_if_fallback_profile(&config, &context.profile);
    locate_nvme_cli().context("nvme-cli is required")?;
    warn_if_unprivileged();

    let runner = ProcessRunner::new();
    let result = Sequencer::new(&context, &runner).run_step(step).await;
    if !result.success {
        eprintln!("{}: {}", result.command, result.error_message());
        return Ok(ExitCode::FAILURE);
    }
    let json = serde_json::to_string_pretty(&result.parsed).context("encoding parsed fields")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn list_steps() {
    for descriptor in StepDescriptor::catalog() {
        println!(
            "{}. {:<16} {}",
            descriptor.step.index(),
            descriptor.name(),
            descriptor.description()
        );
    }
}

fn list_profiles() {
    for profile in DeviceProfile::all() {
        println!("{:<8} {} ({})", profile.key, profile.series, profile.interface);
        println!(
            "         link x{} {}, temp <= {}C, spare >= {}%, used <= {}%, timeout {}s, namespaces {}",
            profile.pcie.width,
            generation_name(profile.pcie.speed),
            profile.smart.max_temperature,
            profile.smart.min_available_spare,
            profile.smart.max_percent_used,
            profile.command_timeout_secs,
            profile.expected_namespaces
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = QualCli::parse();

    let outcome = match cli.command {
        QualCommand::Run { overrides } => run(cli.config, overrides).await,
        QualCommand::Steps => {
            list_steps();
            Ok(ExitCode::SUCCESS)
        }
        QualCommand::Profiles => {
            list_profiles();
            Ok(ExitCode::SUCCESS)
        }
        QualCommand::Step { name, overrides } => run_single_step(cli.config, name, overrides).await,
    };

    match outcome {
        Ok(code) => code,
        Err(error) => {
            error!("{error:#}");
            eprintln!("nvme-qual: {error:#}");
            ExitCode::from(SETUP_ERROR)
        }
    }
}
