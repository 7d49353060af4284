//! Core orchestration logic for the provisioner
//!
//! This crate sequences the provisioning stages and produces the final,
//! verified report.

pub mod engine;
pub mod report;
pub mod state;

// Re-export commonly used types
pub use engine::{Orchestrator, RunOutcome};
pub use report::{render_json, render_text, ReportGenerator, Summary};
pub use state::RunStage;
