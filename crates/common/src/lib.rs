//! Common utilities and types for the provisioner
//!
//! This crate provides functionality shared by every provisioning stage,
//! including the error taxonomy, the run report and the platform profile.

pub mod error;
pub mod models;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{EnvironmentError, Error, Result, StepError};
pub use models::*;
pub use types::*;
