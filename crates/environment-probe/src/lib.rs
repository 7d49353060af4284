//! Environment detection for the provisioner
//!
//! This crate detects the host platform and locates the external tools the
//! later stages depend on, producing a single [`PlatformProfile`].
//!
//! [`PlatformProfile`]: common::types::PlatformProfile

pub mod detector;
pub mod distributions;
pub mod os_release;

// Re-export commonly used types
pub use detector::EnvironmentProbe;
