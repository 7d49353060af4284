//! Configuration management for the provisioner
//!
//! This crate provides the configuration schema and a manager that layers
//! built-in defaults, config files, list files, environment variables and
//! command-line overrides.

pub mod defaults;
pub mod manager;
pub mod schema;
pub mod sources;
pub mod validation;

// Re-export commonly used types
pub use manager::ConfigManager;
pub use schema::{FetchSettings, PackageSettings, ProvisionConfig, ToolSettings};
pub use sources::{ConfigSource, EnvSource, FileFormat, FileSource, ListFileSource, ListTarget};
pub use validation::ConfigValidator;
