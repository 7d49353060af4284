//! Subprocess execution for the provisioner
//!
//! Every external collaborator (pip, the model-serving tool, the service
//! manager) is reached through the [`CommandExecutor`] trait.

pub mod command;
pub mod executor;
pub mod scripted;

// Re-export commonly used types
pub use command::{CommandOutput, CommandSpec, ExecError};
pub use executor::{CommandExecutor, SystemExecutor};
pub use scripted::{Reply, ScriptedExecutor};
