//! Error types for the common crate
//!
//! This module defines the error taxonomy used throughout the provisioner.
//! Only [`EnvironmentError`] aborts a run; every [`StepError`] is captured
//! into the run report as a per-item failure.

use thiserror::Error;

/// Result type for provisioner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for provisioner operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Already exists error
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fatal errors raised while probing the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    /// None of the interpreter candidates answered `--version`
    #[error("no Python runtime found (tried: {})", .candidates.join(", "))]
    RuntimeNotFound { candidates: Vec<String> },

    /// The runtime exists but no package manager could be resolved for it
    #[error("no package manager found for runtime '{runtime}' (tried: {})", .candidates.join(", "))]
    PackageManagerNotFound {
        runtime: String,
        candidates: Vec<String>,
    },

    /// The distribution has no known native package manager
    #[error("unsupported distribution '{id}': no package manager mapping")]
    UnsupportedDistribution { id: String },
}

/// Recoverable, per-item or per-stage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Package manager install verb failed
    #[error("install of '{package}' failed: {reason}")]
    DependencyInstall { package: String, reason: String },

    /// Remote install procedure for the model-serving tool failed
    #[error("tool installation failed: {0}")]
    ToolInstall(String),

    /// Service start/enable failed
    #[error("service control failed: {0}")]
    Service(String),

    /// Model pull failed or timed out
    #[error("pull of '{model}' failed: {reason}")]
    ModelFetch { model: String, reason: String },

    /// The verification query itself errored
    #[error("verification of '{item}' errored: {reason}")]
    Verification { item: String, reason: String },
}
