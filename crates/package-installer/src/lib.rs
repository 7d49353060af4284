//! Python package installation for the provisioner
//!
//! Installs the declared packages one by one through the resolved package
//! manager and verifies them afterwards.

pub mod installer;
pub mod requirement;
pub mod verify;

// Re-export commonly used types
pub use installer::{PackageInstaller, ALREADY_SATISFIED};
pub use requirement::Requirement;
pub use verify::{query_requirement, verify_dependencies};
