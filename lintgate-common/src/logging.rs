//! Tracing setup for the binaries.
//!
//! Logs always go to stderr: stdout carries the hook message and nothing
//! else. The daemon can additionally write a daily-rolling file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Variable holding an `EnvFilter` directive, e.g. `lintgate_common=debug`.
pub const LOG_ENV: &str = "LINTGATE_LOG";

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Level used when neither `LINTGATE_LOG` nor `verbose` is set.
    pub default_level: &'static str,
    pub verbose: bool,
    /// Directory for a daily-rolling log file.
    pub log_dir: Option<PathBuf>,
    /// File name prefix inside `log_dir`.
    pub file_prefix: &'static str,
}

/// Keeps the file writer flushing until dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn build_filter(options: &LogOptions) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    if options.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(options.default_level)
    }
}

/// Install the global subscriber.
pub fn init(options: &LogOptions) -> Result<LogGuard> {
    let filter = build_filter(options);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, file_guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, options.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}
