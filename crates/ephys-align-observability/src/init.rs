// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console logging is always available. With the `file-logging` feature,
//! [`init_logging`] also writes per-crate JSON log files with daily rotation
//! and run-folder retention.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Console-only logging, for tools and tests
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_console_logging(debug_flags: &CrateDebugFlags) -> Result<()> {
    let env_filter = EnvFilter::try_new(debug_flags.to_filter_string())
        .context("Invalid log filter")?;
    Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(env_filter),
        )
        .try_init()
        .context("Global tracing subscriber already set")?;
    Ok(())
}

/// Logging initialization result
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Get the run folder logs are written to
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Initialize logging with file output and console output
///
/// Creates a timestamped folder structure:
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       ├── ephys-align-geometry.log
///       ├── ephys-align-qc.log
///       └── ephys-align.log (combined)
/// ```
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags for filtering
/// * `log_dir` - Base directory for logs (default: `./logs`)
/// * `retention_days` - Keep logs for N days (default: 30)
/// * `retention_runs` - Keep N most recent runs (default: 10)
#[cfg(feature = "file-logging")]
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    log_dir: Option<PathBuf>,
    retention_days: Option<u64>,
    retention_runs: Option<usize>,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));

    let run_folder = base_log_dir.join(format!(
        "{}{}",
        RUN_PREFIX,
        Utc::now().format(RUN_TIMESTAMP_FORMAT)
    ));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(
        &base_log_dir,
        retention_days.unwrap_or(30),
        retention_runs.unwrap_or(10),
        &run_folder,
    )?;

    let env_filter =
        EnvFilter::try_new(debug_flags.to_filter_string()).context("Invalid log filter")?;

    let mut layers = Vec::new();
    let mut file_guards = Vec::new();

    // Console layer (human-readable)
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter.clone())
            .boxed(),
    );

    // One file per member crate; the umbrella crate only shows up in the combined file
    for crate_name in crate::KNOWN_CRATES.iter().skip(1) {
        let (writer, guard) =
            tracing_appender::non_blocking(rolling::daily(&run_folder, format!("{}.log", crate_name)));
        file_guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(EnvFilter::new(format!("off,{}=debug", crate_name)))
                .boxed(),
        );
    }

    // Combined log file
    let (combined, combined_guard) =
        tracing_appender::non_blocking(rolling::daily(&run_folder, "ephys-align.log"));
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(env_filter)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already set")?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Initialize logging with default settings
#[cfg(feature = "file-logging")]
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, None, None, None)
}

fn run_timestamp(path: &Path) -> Option<chrono::DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. `keep` is never removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
    keep: &Path,
) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if path.is_dir() && path != keep {
            if let Some(stamp) = run_timestamp(&path) {
                runs.push((path, stamp));
            }
        }
    }
    // newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    // `keep` counts towards the run budget
    let budget = retention_runs.saturating_sub(1);
    for (index, (path, stamp)) in runs.iter().enumerate() {
        if *stamp < cutoff || index >= budget {
            if let Err(e) = std::fs::remove_dir_all(path) {
                eprintln!(
                    "Warning: Failed to remove old log directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    Ok(())
}
