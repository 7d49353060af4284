//! Subscriber installation
//!
//! Logs always go to stderr so stdout carries only the final report. An
//! optional file sink writes plain (uncoloured) lines through a
//! non-blocking appender.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use anyhow::{Context, Result};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::filter::build_filter;

/// Console log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// Single-line, terse
    Compact,
    /// One JSON object per line
    Json,
}

/// Unknown log format name
#[derive(Error, Debug)]
#[error("unknown log format '{0}' (expected pretty, compact or json)")]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ParseLogFormatError(other.to_string())),
        }
    }
}

/// Logging options
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Number of `-v` flags
    pub verbosity: u8,

    /// Only warnings and errors
    pub quiet: bool,

    /// Console format
    pub format: LogFormat,

    /// Optional log file
    pub file: Option<PathBuf>,
}

/// Keeps the file appender flushing until dropped
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let filter = build_filter(config.verbosity, config.quiet);

    let console = match config.format {
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).with_target(false).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = path
        .file_name()
        .with_context(|| format!("log file path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(name)))
}
