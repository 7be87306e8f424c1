// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingLevel;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "nvme_qual";

/// Install the global subscriber: stderr always, plus a per-run log file
/// under `log_dir` when given. Returns the log file path if one was opened.
///
/// `RUST_LOG` takes precedence over `level`. Calling this twice is harmless;
/// the second subscriber is simply not installed.
pub fn init(level: LoggingLevel, log_dir: Option<&Path>, timestamp: &str) -> Option<PathBuf> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(level));

    let file = log_dir.and_then(|dir| match file_writer(dir, timestamp) {
        Ok(opened) => Some(opened),
        Err(error) => {
            eprintln!("nvme-qual: failed to initialize file logging: {error:#}");
            None
        }
    });

    match file {
        Some((writer, guard, path)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(env_filter(level));

            let _ = tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init();

            // Keep the background logging worker alive for the duration of the process.
            let _ = LOG_GUARD.set(guard);
            Some(path)
        }
        None => {
            let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
            None
        }
    }
}

fn env_filter(level: LoggingLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()))
}

pub fn log_file_name(timestamp: &str) -> String {
    format!("{LOG_PREFIX}_{timestamp}.log")
}

fn file_writer(
    dir: &Path,
    timestamp: &str,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard, PathBuf)> {
    if let Err(e) = fs::create_dir_all(dir) {
        return Err(anyhow::anyhow!(
            "create log directory failed: {} ({})",
            dir.display(),
            e
        ));
    }

    let file_name = log_file_name(timestamp);
    let appender = tracing_appender::rolling::never(dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    Ok((writer, guard, dir.join(file_name)))
}
