//! Package installer implementation

use std::sync::Arc;
use tracing::{debug, info, warn};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::models::{DeclaredDependencySet, Phase, RunReport, StepResult, Verification};
use common::types::PlatformProfile;
use config::PackageSettings;

use crate::requirement::Requirement;
use crate::verify::query_requirement;

/// Detail recorded for packages that were already installed
pub const ALREADY_SATISFIED: &str = "already satisfied";

/// Installs declared packages through the interpreter's package manager
pub struct PackageInstaller {
    executor: Arc<dyn CommandExecutor>,
    settings: PackageSettings,
}

impl PackageInstaller {
    /// Creates a new package installer
    pub fn new(executor: Arc<dyn CommandExecutor>, settings: PackageSettings) -> Self {
        Self { executor, settings }
    }

    /// Installs every declared package in order
    ///
    /// Best-effort: a failing package is recorded and the loop continues.
    /// The returned report holds exactly one entry per declared package.
    pub async fn install_all(&self, deps: &DeclaredDependencySet, profile: &PlatformProfile) -> RunReport {
        let mut report = RunReport::new();

        if deps.is_empty() {
            info!("No packages declared");
            return report;
        }

        if self.settings.refresh_system_index {
            self.refresh_native_index(profile).await;
        }
        self.upgrade_package_manager(profile).await;

        info!("Installing {} package(s) with {}", deps.len(), profile.package_manager);
        for dep in deps.iter() {
            let (result, detail) = self.install_one(dep, profile).await;
            match &result {
                StepResult::Success => info!("{}: ok", dep),
                other => warn!("{}: {}", dep, other),
            }
            // declared sets are duplicate-free
            if let Err(e) = report.record_with_detail(Phase::PackageInstall, dep, result, detail) {
                warn!("{}", e);
            }
        }

        report
    }

    async fn install_one(&self, dep: &str, profile: &PlatformProfile) -> (StepResult, Option<String>) {
        if !self.settings.upgrade {
            match Requirement::parse(dep) {
                Ok(requirement) if !requirement.needs_install_check() => {
                    let timeout = self.settings.query_timeout();
                    match query_requirement(self.executor.as_ref(), profile, &requirement, timeout).await {
                        Verification::Present => {
                            debug!("{} is already satisfied", dep);
                            return (StepResult::Success, Some(ALREADY_SATISFIED.to_string()));
                        }
                        Verification::Absent => {}
                        Verification::CheckFailed(reason) => debug!("Pre-check for {} failed: {}", dep, reason),
                    }
                }
                Ok(_) => debug!("{} names extras or a direct reference; letting pip decide", dep),
                Err(reason) => debug!("Cannot parse {}: {}", dep, reason),
            }
        }

        let mut args = vec!["install".to_string()];
        if self.settings.upgrade {
            args.push("--upgrade".to_string());
        }
        args.push(dep.to_string());

        let spec = CommandSpec::from(profile.package_manager_command(args))
            .timeout(self.settings.install_timeout());

        let reason = match self.executor.execute(&spec).await {
            Ok(output) if output.success() => return (StepResult::Success, None),
            Ok(output) => output.failure_reason(),
            Err(e) => e.to_string(),
        };
        let err = StepError::DependencyInstall {
            package: dep.to_string(),
            reason,
        };
        (StepResult::Failure(err.to_string()), None)
    }

    /// Upgrades the package manager itself; failures only warn
    async fn upgrade_package_manager(&self, profile: &PlatformProfile) {
        let spec = CommandSpec::from(profile.package_manager_command(["install", "--upgrade", "pip"]))
            .timeout(self.settings.install_timeout());
        match self.executor.execute(&spec).await {
            Ok(output) if output.success() => debug!("Package manager is up to date"),
            Ok(output) => warn!("Package manager self-upgrade failed: {}", output.failure_reason()),
            Err(e) => warn!("Package manager self-upgrade failed: {}", e),
        }
    }

    /// Refreshes the native package index; failures only warn
    async fn refresh_native_index(&self, profile: &PlatformProfile) {
        let manager = profile.native_package_manager;
        let Some(line) = manager.refresh_command() else {
            debug!("{} has no index refresh", manager);
            return;
        };
        let line = if manager.needs_elevation() {
            line.elevated(profile.elevation())
        } else {
            line
        };

        info!("Refreshing {} package index", manager);
        let spec = CommandSpec::from(line).timeout(self.settings.install_timeout());
        match self.executor.execute(&spec).await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!("Package index refresh failed: {}", output.failure_reason()),
            Err(e) => warn!("Package index refresh failed: {}", e),
        }
    }
}
