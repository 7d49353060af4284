//! Provisioning pipeline
//!
//! Runs the stages strictly in sequence:
//! probe, package installer, tool installer, model fetcher, report.
//! Only a probe failure ends the run early; every other stage records
//! per-item outcomes and hands over to the next.

use std::sync::Arc;
use tracing::{error, info, warn};

use command_executor::CommandExecutor;
use common::error::EnvironmentError;
use common::models::{DeclaredDependencySet, DeclaredModelSet, Phase, RunReport, ToolStatus};
use common::types::PlatformProfile;
use config::ProvisionConfig;
use environment_probe::EnvironmentProbe;
use model_manager::{ModelFetcher, ScriptFetcher, ToolInstaller};
use package_installer::PackageInstaller;

use crate::report::{ReportGenerator, Summary};
use crate::state::RunStage;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Detected platform
    pub profile: PlatformProfile,

    /// Install-phase outcomes of packages and models
    pub report: RunReport,

    /// Final state of the model-serving tool
    pub tool: ToolStatus,

    /// Verified summary
    pub summary: Summary,
}

/// The provisioning orchestrator
pub struct Orchestrator {
    /// Validated configuration
    config: ProvisionConfig,

    /// Subprocess executor shared by every stage
    executor: Arc<dyn CommandExecutor>,

    /// Installer download backend
    fetcher: Arc<dyn ScriptFetcher>,

    /// Platform probe
    probe: EnvironmentProbe,

    /// Current stage
    stage: RunStage,
}

impl Orchestrator {
    /// Creates an orchestrator probing the running host
    pub fn new(config: ProvisionConfig, executor: Arc<dyn CommandExecutor>, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        let probe = EnvironmentProbe::new(executor.clone()).with_probe_timeout(config.packages.query_timeout());
        Self {
            config,
            executor,
            fetcher,
            probe,
            stage: RunStage::new(),
        }
    }

    /// Replaces the platform probe
    pub fn with_probe(mut self, probe: EnvironmentProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Current stage
    pub fn stage(&self) -> &RunStage {
        &self.stage
    }

    /// Runs every stage and returns the verified outcome
    ///
    /// Fails only when the environment probe fails; no install step runs
    /// in that case. A finished orchestrator may run again.
    pub async fn run(&mut self) -> Result<RunOutcome, EnvironmentError> {
        let deps: DeclaredDependencySet = self.config.declared_dependencies();
        let models: DeclaredModelSet = self.config.declared_models();

        if self.stage.is_terminal() {
            self.stage = RunStage::new();
        }

        self.enter(RunStage::Probing);
        let profile = match self.probe.detect().await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Environment probe failed: {}", e);
                self.enter(RunStage::Failed(e.to_string()));
                return Err(e);
            }
        };

        self.enter(RunStage::InstallingPackages);
        let installer = PackageInstaller::new(self.executor.clone(), self.config.packages.clone());
        let mut report = installer.install_all(&deps, &profile).await;

        self.enter(RunStage::InstallingTool);
        let tool_installer = ToolInstaller::new(
            self.executor.clone(),
            self.fetcher.clone(),
            self.config.tool.clone(),
            self.config.packages.query_timeout(),
        );
        let tool = tool_installer.ensure_tool_and_service(&profile).await;
        if let Some(result) = tool.service.clone() {
            if let Err(e) = report.record(Phase::Service, &self.config.tool.service_name, result) {
                warn!("{}", e);
            }
        }

        self.enter(RunStage::FetchingModels);
        let fetcher = ModelFetcher::new(self.executor.clone(), self.config.fetch.clone(), &self.config.tool.program);
        let fetched = fetcher.fetch_all(&models, &tool).await;
        if let Err(e) = report.merge(fetched) {
            warn!("{}", e);
        }

        self.enter(RunStage::Reporting);
        let generator = ReportGenerator::new(
            self.executor.clone(),
            &self.config.tool.program,
            self.config.packages.query_timeout(),
        );
        let summary = generator.verify(&profile, &deps, &models, &report, &tool).await;

        self.enter(RunStage::Completed);
        if summary.all_present() {
            info!("Run completed: every declared item is present");
        } else {
            warn!(
                "Run completed: {} of {} item(s) present, {} failure(s)",
                summary.present_count(),
                summary.item_count(),
                report.failure_count()
            );
        }

        Ok(RunOutcome {
            profile,
            report,
            tool,
            summary,
        })
    }

    fn enter(&mut self, next: RunStage) {
        if !self.stage.can_advance_to(&next) {
            warn!("Unexpected stage change: {} -> {}", self.stage, next);
        }
        info!("Stage: {}", next);
        self.stage = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use command_executor::{Reply, ScriptedExecutor};
    use common::error::StepError;
    use common::models::{StepResult, ToolState};
    use model_manager::NO_SERVICE_MANAGER;
    use package_installer::ALREADY_SATISFIED;
    use common::types::OsFamily;

    use crate::report::render_text;

    struct OfflineFetcher;

    #[async_trait]
    impl ScriptFetcher for OfflineFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, StepError> {
            Err(StepError::ToolInstall(format!("download of {} failed: offline", url)))
        }
    }

    struct Host {
        _dir: tempfile::TempDir,
        exec: ScriptedExecutor,
        orchestrator: Orchestrator,
    }

    fn host(config: ProvisionConfig) -> Host {
        let dir = tempfile::tempdir().unwrap();
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, "ID=debian\nPRETTY_NAME=\"Debian GNU/Linux 12\"\n").unwrap();

        let exec = ScriptedExecutor::new();
        let shared: Arc<dyn CommandExecutor> = Arc::new(exec.clone());
        let probe = EnvironmentProbe::new(shared.clone())
            .with_os_family(OsFamily::Linux)
            .with_os_release_path(&os_release)
            .with_systemd_marker(dir.path().join("no-systemd"))
            .with_effective_uid(Some(0));
        let orchestrator = Orchestrator::new(config, shared, Arc::new(OfflineFetcher)).with_probe(probe);

        Host {
            _dir: dir,
            exec,
            orchestrator,
        }
    }

    fn config(deps: &[&str], models: &[&str]) -> ProvisionConfig {
        let mut config = ProvisionConfig::default();
        config.dependencies = deps.iter().map(|s| s.to_string()).collect();
        config.models = models.iter().map(|s| s.to_string()).collect();
        config.fetch.settle_delay_secs = 0;
        config
    }

    #[tokio::test]
    async fn test_missing_runtime_aborts_before_installing() {
        let mut host = host(config(&["alpha"], &["m1:tag"]));

        let err = host.orchestrator.run().await.unwrap_err();

        assert!(matches!(err, EnvironmentError::RuntimeNotFound { .. }));
        assert!(host.orchestrator.stage().is_failed());
        assert!(!host.exec.was_called(&["pip3", "install"]));
        assert!(!host.exec.was_called(&["ollama"]));
    }

    #[tokio::test]
    async fn test_tool_unavailable_run() {
        let mut host = host(config(&["alpha", "beta"], &["m1:tag", "m2:tag"]));
        let exec = &host.exec;
        exec.on(&["python3", "--version"], Reply::success("Python 3.11.2"));
        exec.on(&["pip3", "--version"], Reply::success("pip 23.0.1"));
        exec.on(&["pip3", "install", "--upgrade", "pip"], Reply::success(""));
        exec.once(&["pip3", "show", "alpha"], Reply::exit(1, ""));
        exec.on(&["pip3", "show", "alpha"], Reply::success("Name: alpha"));
        exec.on(&["pip3", "show", "beta"], Reply::exit(1, ""));
        exec.on(&["pip3", "install", "alpha"], Reply::success(""));
        exec.on(&["pip3", "install", "beta"], Reply::exit(1, "ERROR: No matching distribution found for beta"));

        let outcome = host.orchestrator.run().await.unwrap();

        assert_eq!(host.orchestrator.stage(), &RunStage::Completed);
        assert_eq!(outcome.tool.state, ToolState::Absent);
        assert_eq!(
            outcome.report.get(Phase::ModelFetch, "m1:tag").unwrap().result,
            StepResult::Skipped("tool unavailable".to_string())
        );
        assert!(!host.exec.was_called(&["ollama", "pull"]));
        assert!(!host.exec.was_called(&["ollama", "list"]));

        let text = render_text(&outcome.summary, false);
        let items: Vec<&str> = text.lines().filter(|l| l.starts_with('[')).collect();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], "[ OK ] alpha");
        assert!(items[1].starts_with("[FAIL] beta"));
        assert!(items[2].starts_with("[ ?? ] m1:tag"));
        assert!(items[3].starts_with("[ ?? ] m2:tag"));
        assert!(text.contains("tool unavailable: all models skipped"));
    }

    #[tokio::test]
    async fn test_full_success_run() {
        let mut host = host(config(&["alpha"], &["m1:tag"]));
        let exec = &host.exec;
        exec.on(&["python3", "--version"], Reply::success("Python 3.11.2"));
        exec.on(&["pip3", "--version"], Reply::success("pip 23.0.1"));
        exec.on(&["pip3", "install"], Reply::success(""));
        exec.on(&["pip3", "show", "alpha"], Reply::success("Name: alpha"));
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["pgrep"], Reply::success("777"));
        exec.on(&["ollama", "pull"], Reply::success(""));
        exec.on(&["ollama", "list"], Reply::success("NAME ID SIZE MODIFIED\nm1:tag 1 1 now\n"));

        let outcome = host.orchestrator.run().await.unwrap();

        assert!(outcome.summary.all_present());
        assert_eq!(outcome.tool.state, ToolState::ServiceUnknown);
        assert_eq!(outcome.report.failure_count(), 0);
        // already present, so never installed
        assert!(!host.exec.was_called(&["pip3", "install", "alpha"]));
    }

    fn scripted_host(exec: &ScriptedExecutor) {
        exec.on(&["python3", "--version"], Reply::success("Python 3.11.2"));
        exec.on(&["pip3", "--version"], Reply::success("pip 23.0.1"));
        exec.on(&["pip3", "install", "--upgrade", "pip"], Reply::success(""));
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["pgrep"], Reply::success("777"));
        exec.on(&["ollama", "pull"], Reply::success(""));
        exec.on(&["ollama", "list"], Reply::success("NAME ID SIZE MODIFIED\nm1:tag 1 1 now\n"));
    }

    #[tokio::test]
    async fn test_second_run_finds_everything_satisfied() {
        let mut host = host(config(&["alpha"], &["m1:tag"]));
        let exec = &host.exec;
        scripted_host(exec);
        exec.once(&["pip3", "show", "alpha"], Reply::exit(1, ""));
        exec.on(&["pip3", "show", "alpha"], Reply::success("Name: alpha\nVersion: 1.0\n"));
        exec.on(&["pip3", "install", "alpha"], Reply::success(""));

        let first = host.orchestrator.run().await.unwrap();
        let second = host.orchestrator.run().await.unwrap();

        assert_eq!(host.orchestrator.stage(), &RunStage::Completed);
        assert!(first.summary.all_present());
        assert!(second.summary.all_present());
        let entry = second.report.get(Phase::PackageInstall, "alpha").unwrap();
        assert!(entry.result.is_success());
        assert_eq!(entry.detail.as_deref(), Some(ALREADY_SATISFIED));
        assert_eq!(host.exec.calls_matching(&["pip3", "install", "alpha"]).len(), 1);
    }

    #[tokio::test]
    async fn test_only_declared_items_are_verified() {
        let mut host = host(config(&["alpha", "beta"], &["m1:tag"]));
        let exec = &host.exec;
        scripted_host(exec);
        exec.on(&["pip3", "show"], Reply::success("Name: x\nVersion: 1.0\n"));

        let outcome = host.orchestrator.run().await.unwrap();

        let shown: Vec<String> = host
            .exec
            .calls_matching(&["pip3", "show"])
            .into_iter()
            .map(|c| c.args[1].clone())
            .collect();
        assert!(!shown.is_empty());
        assert!(shown.iter().all(|name| name == "alpha" || name == "beta"));

        let items: Vec<&str> = outcome.summary.dependencies.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(items, vec!["alpha", "beta"]);
        assert!(!render_text(&outcome.summary, false).contains("gamma"));
    }

    #[tokio::test]
    async fn test_service_outcome_is_recorded() {
        let mut host = host(config(&[], &[]));
        scripted_host(&host.exec);

        let outcome = host.orchestrator.run().await.unwrap();

        assert_eq!(
            outcome.report.get(Phase::Service, "ollama").unwrap().result,
            StepResult::Skipped(NO_SERVICE_MANAGER.to_string())
        );
    }
}
