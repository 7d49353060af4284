//! Model fetcher implementation
//!
//! Pulls declared models one at a time through the tool's CLI. Each pull
//! is bounded by the configured timeout; a pull that exceeds it is killed
//! and recorded as a failure.

use std::sync::Arc;
use tracing::{info, warn};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::models::{DeclaredModelSet, Phase, RunReport, StepResult, ToolStatus};
use common::utils::format_duration;
use config::FetchSettings;

/// Skip reason used when the tool could not be made available
pub const TOOL_UNAVAILABLE: &str = "tool unavailable";

/// Skip reason used when model fetching was disabled by the operator
pub const FETCH_DISABLED: &str = "model fetch disabled";

/// Pulls models through the model-serving tool
pub struct ModelFetcher {
    executor: Arc<dyn CommandExecutor>,
    settings: FetchSettings,
    program: String,
}

impl ModelFetcher {
    /// Creates a new model fetcher
    pub fn new(executor: Arc<dyn CommandExecutor>, settings: FetchSettings, program: impl Into<String>) -> Self {
        Self {
            executor,
            settings,
            program: program.into(),
        }
    }

    /// Pulls every declared model in order
    ///
    /// Returns one entry per declared model. When the tool is unavailable
    /// or fetching is disabled, every model is recorded as skipped and no
    /// subprocess is started.
    pub async fn fetch_all(&self, models: &DeclaredModelSet, tool: &ToolStatus) -> RunReport {
        if self.settings.skip {
            info!("Model fetch disabled; skipping {} model(s)", models.len());
            return skip_all(models, FETCH_DISABLED);
        }
        if !tool.is_available() {
            warn!("{} unavailable; skipping {} model(s)", self.program, models.len());
            return skip_all(models, TOOL_UNAVAILABLE);
        }

        let mut report = RunReport::new();
        if models.is_empty() {
            return report;
        }

        let settle = self.settings.settle_delay();
        if !settle.is_zero() {
            info!("Waiting {} for the {} service to settle", format_duration(settle), self.program);
            tokio::time::sleep(settle).await;
        }

        let program = tool.command(&self.program);
        for model in models.iter() {
            let result = self.pull(program, model).await;
            if let Err(e) = report.record(Phase::ModelFetch, model, result) {
                warn!("{}", e);
            }
        }

        report
    }

    async fn pull(&self, program: &str, model: &str) -> StepResult {
        info!("Pulling {} (timeout {})", model, format_duration(self.settings.pull_timeout()));
        let spec = CommandSpec::new(program)
            .args(["pull", model])
            .timeout(self.settings.pull_timeout());

        let reason = match self.executor.execute(&spec).await {
            Ok(output) if output.success() => {
                info!("Pulled {} in {}", model, format_duration(output.elapsed));
                return StepResult::Success;
            }
            Ok(output) => output.failure_reason(),
            Err(e) => e.to_string(),
        };

        let err = StepError::ModelFetch {
            model: model.to_string(),
            reason,
        };
        warn!("{}", err);
        StepResult::Failure(err.to_string())
    }
}

fn skip_all(models: &DeclaredModelSet, reason: &str) -> RunReport {
    let mut report = RunReport::new();
    for model in models.iter() {
        if let Err(e) = report.record(Phase::ModelFetch, model, StepResult::Skipped(reason.to_string())) {
            warn!("{}", e);
        }
    }
    report
}
