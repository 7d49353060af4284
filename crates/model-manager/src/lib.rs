//! Model-serving tool management for the provisioner
//!
//! This crate installs the model-serving tool, drives its background
//! service, pulls the declared models and verifies them afterwards.

pub mod downloader;
pub mod fetcher;
pub mod installer;
pub mod repository;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use downloader::{HttpScriptFetcher, ScriptFetcher};
pub use fetcher::{ModelFetcher, FETCH_DISABLED, TOOL_UNAVAILABLE};
pub use installer::{ToolInstaller, NO_SERVICE_MANAGER};
pub use repository::{parse_list, verify_models};
pub use state::ToolLifecycle;
