//! Model-serving tool installer
//!
//! Ensures the tool binary is present and its background service is up.
//! Nothing in this stage aborts the run: every problem becomes a note on
//! the returned [`ToolStatus`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::StepError;
use common::models::{StepResult, ToolState, ToolStatus};
use common::types::{CommandLine, OsFamily, PlatformProfile, ServiceManager};
use config::ToolSettings;

use crate::downloader::{download_to_temp, ScriptFetcher};
use crate::service;
use crate::state::ToolLifecycle;

/// Skip reason of the service step on hosts without systemd
pub const NO_SERVICE_MANAGER: &str = "no service manager";

/// Installs and starts the model-serving tool
pub struct ToolInstaller {
    executor: Arc<dyn CommandExecutor>,
    fetcher: Arc<dyn ScriptFetcher>,
    settings: ToolSettings,
    query_timeout: Duration,
}

impl ToolInstaller {
    /// Creates a new tool installer
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        fetcher: Arc<dyn ScriptFetcher>,
        settings: ToolSettings,
        query_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            fetcher,
            settings,
            query_timeout,
        }
    }

    /// Makes sure the tool is installed and its service is running
    pub async fn ensure_tool_and_service(&self, profile: &PlatformProfile) -> ToolStatus {
        let mut lifecycle = ToolLifecycle::new();

        let version = match self.locate(&mut lifecycle, profile).await {
            Some(version) => {
                info!("{} already installed ({})", self.settings.program, version);
                self.advance(&mut lifecycle, ToolState::Installed);
                Some(version)
            }
            None => self.install(&mut lifecycle, profile).await,
        };

        if !lifecycle.state().is_available() {
            return lifecycle.into_status(version, None);
        }

        let process_running = match profile.service_manager {
            Some(ServiceManager::Systemd) => {
                match service::start_and_enable(
                    self.executor.as_ref(),
                    profile,
                    &self.settings.service_name,
                    self.query_timeout,
                )
                .await
                {
                    Ok(()) => {
                        lifecycle.record_service(StepResult::Success);
                        self.advance(&mut lifecycle, ToolState::ServiceRunning);
                        Some(true)
                    }
                    Err(e) => {
                        warn!("{}", e);
                        lifecycle.note(e.to_string());
                        lifecycle.record_service(StepResult::Failure(e.to_string()));
                        self.advance(&mut lifecycle, ToolState::ServiceFailed);
                        None
                    }
                }
            }
            None => {
                lifecycle.record_service(StepResult::Skipped(NO_SERVICE_MANAGER.to_string()));
                self.advance(&mut lifecycle, ToolState::ServiceUnknown);
                let running = service::process_running(
                    self.executor.as_ref(),
                    profile.os_family,
                    &self.settings.program,
                    self.query_timeout,
                )
                .await;
                lifecycle.note(match running {
                    Some(true) => format!("{}; {} server process is running", NO_SERVICE_MANAGER, self.settings.program),
                    Some(false) => format!(
                        "{}; {} server process is not running (start it with '{} serve')",
                        NO_SERVICE_MANAGER, self.settings.program, self.settings.program
                    ),
                    None => format!("{}; server process state unknown", NO_SERVICE_MANAGER),
                });
                running
            }
        };

        lifecycle.into_status(version, process_running)
    }

    /// Runs the install procedure, leaving the lifecycle in `Installed` or `Absent`
    async fn install(&self, lifecycle: &mut ToolLifecycle, profile: &PlatformProfile) -> Option<String> {
        self.advance(lifecycle, ToolState::Installing);

        if let Err(e) = self.run_installer(profile).await {
            warn!("{}", e);
            lifecycle.note(e.to_string());
            self.advance(lifecycle, ToolState::Absent);
            return None;
        }

        match self.locate(lifecycle, profile).await {
            Some(version) => {
                info!("Installed {} ({})", self.settings.program, version);
                self.advance(lifecycle, ToolState::Installed);
                Some(version)
            }
            None => {
                let e = StepError::ToolInstall(format!(
                    "installer finished but '{} --version' still fails",
                    self.settings.program
                ));
                warn!("{}", e);
                lifecycle.note(e.to_string());
                self.advance(lifecycle, ToolState::Absent);
                None
            }
        }
    }

    async fn run_installer(&self, profile: &PlatformProfile) -> Result<(), StepError> {
        match profile.os_family {
            OsFamily::MacOs => {
                let line = profile
                    .native_package_manager
                    .install_command(&[self.settings.program.clone()]);
                self.run_install_command(line).await
            }
            OsFamily::Linux => {
                // removed when dropped, on every exit path
                let script = download_to_temp(self.fetcher.as_ref(), &self.settings.install_url_posix, ".sh").await?;
                let line = CommandLine::new("sh", &[script.to_string_lossy().into_owned()]);
                self.run_install_command(line).await
            }
            OsFamily::Windows => {
                let setup = download_to_temp(self.fetcher.as_ref(), &self.settings.install_url_windows, ".exe").await?;
                let line = CommandLine::new(&setup.to_string_lossy(), self.settings.windows_installer_args.as_slice());
                self.run_install_command(line).await
            }
        }
    }

    async fn run_install_command(&self, line: CommandLine) -> Result<(), StepError> {
        info!("Running {} installer: {}", self.settings.program, line);
        let spec = CommandSpec::from(line).timeout(self.settings.install_timeout());
        let output = self
            .executor
            .execute(&spec)
            .await
            .map_err(|e| StepError::ToolInstall(e.to_string()))?;

        if output.success() {
            Ok(())
        } else {
            Err(StepError::ToolInstall(output.failure_reason()))
        }
    }

    /// Finds a working executable and returns its version
    ///
    /// On Windows a fresh install is not on this process's `PATH` yet, so
    /// the installer's target directory is tried as well.
    async fn locate(&self, lifecycle: &mut ToolLifecycle, profile: &PlatformProfile) -> Option<String> {
        if let Some(version) = self.probe_version(&self.settings.program).await {
            return Some(version);
        }
        if profile.os_family != OsFamily::Windows {
            return None;
        }

        let path = self.settings.windows_executable()?;
        let path = path.to_string_lossy().into_owned();
        let version = self.probe_version(&path).await?;
        debug!("{} answered from {}", self.settings.program, path);
        lifecycle.locate(path);
        Some(version)
    }

    async fn probe_version(&self, program: &str) -> Option<String> {
        let spec = CommandSpec::new(program).arg("--version").timeout(self.query_timeout);
        match self.executor.execute(&spec).await {
            Ok(output) if output.success() => Some(
                output
                    .first_line()
                    .map(|line| line.trim_start_matches("ollama version is ").to_string())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }

    fn advance(&self, lifecycle: &mut ToolLifecycle, next: ToolState) {
        if let Err(e) = lifecycle.transition_to(next) {
            warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::StaticFetcher;
    use command_executor::{Reply, ScriptedExecutor};
    use common::types::NativePackageManager;
    use std::path::PathBuf;

    fn profile(service_manager: Option<ServiceManager>) -> PlatformProfile {
        PlatformProfile {
            os_family: OsFamily::Linux,
            distribution: None,
            native_package_manager: NativePackageManager::Apt,
            runtime: CommandLine::new("python3", &[] as &[&str]),
            runtime_version: "Python 3.11.4".to_string(),
            package_manager: CommandLine::new("pip3", &[] as &[&str]),
            service_manager,
            elevation: None,
        }
    }

    fn installer(exec: &ScriptedExecutor, fetcher: &StaticFetcher) -> ToolInstaller {
        ToolInstaller::new(
            Arc::new(exec.clone()),
            Arc::new(fetcher.clone()),
            ToolSettings::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_installed_tool_skips_install() {
        let exec = ScriptedExecutor::new();
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6\n"));
        exec.on(&["systemctl"], Reply::success(""));
        let fetcher = StaticFetcher::serving("#!/bin/sh\n");

        let status = installer(&exec, &fetcher)
            .ensure_tool_and_service(&profile(Some(ServiceManager::Systemd)))
            .await;

        assert_eq!(status.state, ToolState::ServiceRunning);
        assert_eq!(status.service, Some(StepResult::Success));
        assert_eq!(status.version.as_deref(), Some("0.3.6"));
        assert!(fetcher.urls.lock().is_empty());
        assert!(!exec.was_called(&["sh"]));
    }

    #[tokio::test]
    async fn test_installs_when_absent() {
        let exec = ScriptedExecutor::new();
        exec.once(&["ollama", "--version"], Reply::NotFound);
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["sh"], Reply::success(">>> Install complete."));
        exec.on(&["systemctl"], Reply::success(""));
        let fetcher = StaticFetcher::serving("#!/bin/sh\n");

        let status = installer(&exec, &fetcher)
            .ensure_tool_and_service(&profile(Some(ServiceManager::Systemd)))
            .await;

        assert_eq!(status.state, ToolState::ServiceRunning);
        assert_eq!(*fetcher.urls.lock(), vec!["https://ollama.com/install.sh".to_string()]);

        // the downloaded script no longer exists once the stage is done
        let ran = exec.calls_matching(&["sh"]);
        assert_eq!(ran.len(), 1);
        assert!(!std::path::Path::new(&ran[0].args[0]).exists());
    }

    #[tokio::test]
    async fn test_failed_install_leaves_tool_absent() {
        let exec = ScriptedExecutor::new();
        exec.on(&["ollama", "--version"], Reply::NotFound);
        exec.on(&["sh"], Reply::exit(1, "ERROR: curl is required"));
        let fetcher = StaticFetcher::serving("#!/bin/sh\n");

        let status = installer(&exec, &fetcher)
            .ensure_tool_and_service(&profile(Some(ServiceManager::Systemd)))
            .await;

        assert_eq!(status.state, ToolState::Absent);
        assert!(!status.is_available());
        assert!(status.notes[0].contains("curl is required"));
        assert!(!exec.was_called(&["systemctl"]));
    }

    #[tokio::test]
    async fn test_download_failure_leaves_tool_absent() {
        let exec = ScriptedExecutor::new();
        exec.on(&["ollama", "--version"], Reply::NotFound);

        let status = installer(&exec, &StaticFetcher::failing())
            .ensure_tool_and_service(&profile(None))
            .await;

        assert_eq!(status.state, ToolState::Absent);
        assert!(status.notes[0].starts_with("tool installation failed"));
    }

    #[tokio::test]
    async fn test_service_failure_is_not_fatal() {
        let exec = ScriptedExecutor::new();
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["systemctl", "start"], Reply::exit(1, "Access denied"));

        let status = installer(&exec, &StaticFetcher::failing())
            .ensure_tool_and_service(&profile(Some(ServiceManager::Systemd)))
            .await;

        assert_eq!(status.state, ToolState::ServiceFailed);
        assert!(matches!(&status.service, Some(StepResult::Failure(r)) if r.contains("Access denied")));
        assert!(status.is_available());
        assert!(status.notes[0].contains("Access denied"));
    }

    #[tokio::test]
    async fn test_without_service_manager_checks_process() {
        let exec = ScriptedExecutor::new();
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["pgrep", "-x", "ollama"], Reply::exit(1, ""));

        let status = installer(&exec, &StaticFetcher::failing())
            .ensure_tool_and_service(&profile(None))
            .await;

        assert_eq!(status.state, ToolState::ServiceUnknown);
        assert_eq!(status.service, Some(StepResult::Skipped(NO_SERVICE_MANAGER.to_string())));
        assert_eq!(status.process_running, Some(false));
        assert!(status.notes[0].contains("not running"));
        assert!(!exec.was_called(&["ollama", "serve"]));
    }

    #[tokio::test]
    async fn test_macos_installs_through_homebrew() {
        let exec = ScriptedExecutor::new();
        exec.once(&["ollama", "--version"], Reply::NotFound);
        exec.on(&["ollama", "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["brew", "install", "ollama"], Reply::success("==> Pouring ollama"));
        exec.on(&["pgrep"], Reply::exit(1, ""));
        let fetcher = StaticFetcher::serving("#!/bin/sh\n");
        let mac = PlatformProfile {
            os_family: OsFamily::MacOs,
            native_package_manager: NativePackageManager::Brew,
            ..profile(None)
        };

        let status = installer(&exec, &fetcher).ensure_tool_and_service(&mac).await;

        assert_eq!(status.state, ToolState::ServiceUnknown);
        assert!(exec.was_called(&["brew", "install", "ollama"]));
        assert!(fetcher.urls.lock().is_empty());
        assert!(!exec.was_called(&["sh"]));
    }

    #[tokio::test]
    async fn test_windows_install_found_outside_path() {
        let settings = ToolSettings {
            windows_install_dir: Some(PathBuf::from("C:/Users/dev/AppData/Local/Programs/Ollama")),
            ..ToolSettings::default()
        };
        let installed = settings.windows_executable().unwrap().to_string_lossy().into_owned();

        let exec = ScriptedExecutor::new();
        // the downloaded setup program has a temporary name
        exec.on(&[] as &[&str], Reply::success(""));
        exec.on(&["ollama"], Reply::NotFound);
        exec.once(&[installed.as_str(), "--version"], Reply::NotFound);
        exec.on(&[installed.as_str(), "--version"], Reply::success("ollama version is 0.3.6"));
        exec.on(&["tasklist"], Reply::success("ollama.exe  4242 Console  1  40,000 K"));
        let fetcher = StaticFetcher::serving("MZ");
        let windows = PlatformProfile {
            os_family: OsFamily::Windows,
            native_package_manager: NativePackageManager::Winget,
            ..profile(None)
        };

        let installer = ToolInstaller::new(
            Arc::new(exec.clone()),
            Arc::new(fetcher.clone()),
            settings,
            Duration::from_secs(5),
        );

        let status = installer.ensure_tool_and_service(&windows).await;

        assert_eq!(status.state, ToolState::ServiceUnknown);
        assert_eq!(status.version.as_deref(), Some("0.3.6"));
        assert_eq!(status.executable.as_deref(), Some(installed.as_str()));
        assert_eq!(status.command("ollama"), installed);
        assert_eq!(status.process_running, Some(true));
        assert_eq!(
            *fetcher.urls.lock(),
            vec!["https://ollama.com/download/OllamaSetup.exe".to_string()]
        );
        let setup = exec
            .calls()
            .into_iter()
            .find(|c| c.args.first().map(String::as_str) == Some("/VERYSILENT"))
            .unwrap();
        assert!(!std::path::Path::new(&setup.program).exists());
    }
}
