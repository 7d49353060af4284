//! Command-line interface for the provisioner
//!
//! This crate parses the command line, maps flags onto configuration
//! overrides and logging options, and prints the final report.

pub mod cli;
pub mod output;
pub mod overrides;

// Re-export commonly used types
pub use cli::Cli;
pub use output::{print_fatal, print_report, write_report};
pub use overrides::CliOverrides;
