//! Local model inventory
//!
//! Reads the tool's model listing and checks declared models against it.

use std::time::Duration;
use tracing::{debug, warn};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::models::{DeclaredModelSet, ToolStatus, Verification};
use common::utils::model_base_name;

use crate::fetcher::TOOL_UNAVAILABLE;

/// Extracts model names from `list` output
///
/// The first line is a column header; the name is the first column of
/// every following line.
pub fn parse_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("NAME"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Returns true if `installed` satisfies the declared `model`
fn matches(model: &str, installed: &str) -> bool {
    model_base_name(model) == model_base_name(installed)
}

/// Verifies every declared model with a single listing query
pub async fn verify_models(
    executor: &dyn CommandExecutor,
    program: &str,
    models: &DeclaredModelSet,
    tool: &ToolStatus,
    timeout: Duration,
) -> Vec<(String, Verification)> {
    if models.is_empty() {
        return Vec::new();
    }
    if !tool.is_available() {
        return models
            .iter()
            .map(|m| (m.to_string(), Verification::CheckFailed(TOOL_UNAVAILABLE.to_string())))
            .collect();
    }

    let spec = CommandSpec::new(tool.command(program)).arg("list").timeout(timeout);
    let reason = match executor.execute(&spec).await {
        Ok(output) if output.success() => {
            let installed = parse_list(&output.stdout);
            debug!("Installed models: {:?}", installed);
            return models
                .iter()
                .map(|model| {
                    let verification = if installed.iter().any(|i| matches(model, i)) {
                        Verification::Present
                    } else {
                        Verification::Absent
                    };
                    (model.to_string(), verification)
                })
                .collect();
        }
        Ok(output) => output.failure_reason(),
        Err(e) => e.to_string(),
    };

    warn!("{} failed: {}", spec, reason);
    models
        .iter()
        .map(|model| {
            let err = StepError::Verification {
                item: model.to_string(),
                reason: reason.clone(),
            };
            (model.to_string(), Verification::CheckFailed(err.to_string()))
        })
        .collect()
}
