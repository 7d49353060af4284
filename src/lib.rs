//! Main integration module for the provisioner
//!
//! Wires the real subprocess executor and HTTP installer download into the
//! orchestrator and maps run results onto process exit codes.

use std::sync::Arc;
use anyhow::{Context, Result};
use tracing::{debug, info};

use command_executor::{CommandExecutor, SystemExecutor};
use common::error::EnvironmentError;
use config::ProvisionConfig;
use model_manager::{HttpScriptFetcher, ScriptFetcher};
use orchestrator_core::{Orchestrator, RunOutcome, RunStage};

/// Probe and package installer completed; item failures are in the report
pub const EXIT_OK: u8 = 0;

/// Fatal environment error or invalid configuration
pub const EXIT_FAILURE: u8 = 1;

/// Interrupted by Ctrl-C
pub const EXIT_INTERRUPTED: u8 = 130;

/// Main provisioner
pub struct Provisioner {
    /// Staged pipeline
    orchestrator: Orchestrator,
}

impl Provisioner {
    /// Creates a provisioner acting on the real host
    pub fn new(config: ProvisionConfig) -> Result<Self> {
        let fetcher = HttpScriptFetcher::new(config.tool.download_timeout())
            .context("failed to initialise installer download")?;
        Ok(Self::with_components(
            config,
            Arc::new(SystemExecutor::new()),
            Arc::new(fetcher),
        ))
    }

    /// Creates a provisioner with the given executor and download backend
    pub fn with_components(
        config: ProvisionConfig,
        executor: Arc<dyn CommandExecutor>,
        fetcher: Arc<dyn ScriptFetcher>,
    ) -> Self {
        debug!(
            "Declared {} package(s) and {} model(s)",
            config.dependencies.len(),
            config.models.len()
        );
        Self {
            orchestrator: Orchestrator::new(config, executor, fetcher),
        }
    }

    /// Runs every stage
    pub async fn run(&mut self) -> std::result::Result<RunOutcome, EnvironmentError> {
        info!("Starting provisioning run");
        self.orchestrator.run().await
    }

    /// Current stage of the run
    pub fn stage(&self) -> &RunStage {
        self.orchestrator.stage()
    }
}

/// Exit code for a finished run
pub fn exit_code(result: &std::result::Result<RunOutcome, EnvironmentError>) -> u8 {
    match result {
        Ok(_) => EXIT_OK,
        Err(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_executor::ScriptedExecutor;

    #[tokio::test]
    async fn test_unusable_host_exits_with_failure() {
        // nothing answers, so no runtime can be found on any platform
        let exec = ScriptedExecutor::new();
        let fetcher = HttpScriptFetcher::new(std::time::Duration::from_secs(1)).unwrap();
        let mut provisioner =
            Provisioner::with_components(ProvisionConfig::default(), Arc::new(exec.clone()), Arc::new(fetcher));

        let result = provisioner.run().await;

        assert_eq!(exit_code(&result), EXIT_FAILURE);
        assert!(provisioner.stage().is_failed());
        assert!(!exec.was_called(&["pip3", "install"]));
    }
}
