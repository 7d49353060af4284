//! Logging for the provisioner
//!
//! This crate installs the `tracing` subscriber used by the binary, with
//! verbosity flags, `RUST_LOG` support and an optional log file.

pub mod filter;
pub mod logger;

// Re-export commonly used types
pub use logger::{init, LogConfig, LogFormat, LogGuard};
