//! Environment probe implementation
//!
//! Detects the host platform, the Python runtime, its package manager and
//! the service manager. Probing only reads files and runs `--version`
//! style queries; it never changes system state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use command_executor::{CommandExecutor, CommandSpec};
use common::error::EnvironmentError;
use common::types::{
    CommandLine, Distribution, NativePackageManager, OsFamily, PlatformProfile, ServiceManager,
};

use crate::distributions::package_manager_for;
use crate::os_release::{self, OS_RELEASE_FALLBACK_PATH, OS_RELEASE_PATH};

/// Marker directory present when systemd is PID 1
pub const SYSTEMD_MARKER: &str = "/run/systemd/system";

/// Default ceiling for a single version probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime candidates, most preferred first
pub fn runtime_candidates(os: OsFamily) -> &'static [&'static str] {
    match os {
        OsFamily::Windows => &["python", "py", "python3"],
        OsFamily::Linux | OsFamily::MacOs => &["python3", "python"],
    }
}

/// Standalone package-manager candidates, most preferred first
pub fn package_manager_candidates(os: OsFamily) -> &'static [&'static str] {
    match os {
        OsFamily::Windows => &["pip", "pip3"],
        OsFamily::Linux | OsFamily::MacOs => &["pip3", "pip"],
    }
}

/// Environment probe
pub struct EnvironmentProbe {
    /// Executor for version probes
    executor: Arc<dyn CommandExecutor>,

    /// OS family being probed
    os_family: OsFamily,

    /// OS-release descriptor locations, tried in order
    os_release_paths: Vec<PathBuf>,

    /// Directory whose presence means systemd is running
    systemd_marker: PathBuf,

    /// Effective user id, `None` where not applicable
    effective_uid: Option<u32>,

    /// Ceiling for each probe
    probe_timeout: Duration,
}

impl EnvironmentProbe {
    /// Creates a probe for the running host
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            os_family: OsFamily::current(),
            os_release_paths: vec![PathBuf::from(OS_RELEASE_PATH), PathBuf::from(OS_RELEASE_FALLBACK_PATH)],
            systemd_marker: PathBuf::from(SYSTEMD_MARKER),
            effective_uid: current_euid(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Overrides the OS family
    pub fn with_os_family(mut self, os_family: OsFamily) -> Self {
        self.os_family = os_family;
        self
    }

    /// Overrides the OS-release descriptor location
    pub fn with_os_release_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release_paths = vec![path.into()];
        self
    }

    /// Overrides the systemd marker directory
    pub fn with_systemd_marker(mut self, path: impl Into<PathBuf>) -> Self {
        self.systemd_marker = path.into();
        self
    }

    /// Overrides the effective user id
    pub fn with_effective_uid(mut self, uid: Option<u32>) -> Self {
        self.effective_uid = uid;
        self
    }

    /// Overrides the per-probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Detects the platform profile
    pub async fn detect(&self) -> Result<PlatformProfile, EnvironmentError> {
        info!("Probing environment ({})", self.os_family);

        let distribution = self.read_distribution().await;
        let native_package_manager = self.select_native_package_manager(distribution.as_ref())?;
        debug!("Native package manager: {}", native_package_manager);

        let (runtime, runtime_version) = self.locate_runtime().await?;
        info!("Using {} ({})", runtime, runtime_version);

        let package_manager = self.locate_package_manager(&runtime).await?;
        info!("Using package manager '{}'", package_manager);

        let service_manager = self.detect_service_manager().await;
        let elevation = self.detect_elevation().await;

        Ok(PlatformProfile {
            os_family: self.os_family,
            distribution,
            native_package_manager,
            runtime,
            runtime_version,
            package_manager,
            service_manager,
            elevation,
        })
    }

    async fn read_distribution(&self) -> Option<Distribution> {
        match self.os_family {
            OsFamily::Windows => None,
            OsFamily::MacOs => {
                let version = self
                    .version_of(CommandSpec::new("sw_vers").arg("-productVersion"))
                    .await;
                Some(Distribution {
                    id: "macos".to_string(),
                    id_like: Vec::new(),
                    pretty_name: version.as_ref().map(|v| format!("macOS {}", v)),
                    version_id: version,
                })
            }
            OsFamily::Linux => {
                for path in &self.os_release_paths {
                    match os_release::read(path) {
                        Ok(dist) => {
                            info!(
                                "Detected distribution {} {}",
                                dist.id,
                                dist.version_id.as_deref().unwrap_or("")
                            );
                            return Some(dist);
                        }
                        Err(e) => debug!("Cannot read {}: {}", path.display(), e),
                    }
                }
                warn!("No OS-release descriptor found");
                None
            }
        }
    }

    fn select_native_package_manager(
        &self,
        distribution: Option<&Distribution>,
    ) -> Result<NativePackageManager, EnvironmentError> {
        match self.os_family {
            OsFamily::Windows => Ok(NativePackageManager::Winget),
            OsFamily::MacOs => Ok(NativePackageManager::Brew),
            OsFamily::Linux => {
                let id = distribution
                    .map(|d| d.id.clone())
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                match distribution.and_then(package_manager_for) {
                    Some(manager) => Ok(manager),
                    None => {
                        warn!(
                            "Distribution '{}' is not supported; install Python 3 and pip manually, then re-run",
                            id
                        );
                        Err(EnvironmentError::UnsupportedDistribution { id })
                    }
                }
            }
        }
    }

    async fn locate_runtime(&self) -> Result<(CommandLine, String), EnvironmentError> {
        let candidates = runtime_candidates(self.os_family);
        for candidate in candidates {
            match self.version_of(CommandSpec::new(*candidate).arg("--version")).await {
                Some(version) => return Ok((CommandLine::new(candidate, &[] as &[&str]), version)),
                None => debug!("Runtime candidate '{}' not usable", candidate),
            }
        }
        Err(EnvironmentError::RuntimeNotFound {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        })
    }

    async fn locate_package_manager(&self, runtime: &CommandLine) -> Result<CommandLine, EnvironmentError> {
        let mut tried = Vec::new();

        let mut options: Vec<CommandLine> = package_manager_candidates(self.os_family)
            .iter()
            .map(|c| CommandLine::new(c, &[] as &[&str]))
            .collect();
        options.push(runtime.clone().with_args(["-m", "pip"]));

        for option in options {
            let spec = CommandSpec::from(&option).arg("--version");
            if self.version_of(spec).await.is_some() {
                return Ok(option);
            }
            debug!("Package manager candidate '{}' not usable", option);
            tried.push(option.to_string());
        }

        Err(EnvironmentError::PackageManagerNotFound {
            runtime: runtime.to_string(),
            candidates: tried,
        })
    }

    async fn detect_service_manager(&self) -> Option<ServiceManager> {
        if self.os_family != OsFamily::Linux {
            return None;
        }
        if !self.systemd_marker.exists() {
            debug!("systemd is not running ({} missing)", self.systemd_marker.display());
            return None;
        }
        let spec = CommandSpec::new("systemctl").arg("--version").timeout(self.probe_timeout);
        if self.executor.probe(&spec).await {
            Some(ServiceManager::Systemd)
        } else {
            None
        }
    }

    async fn detect_elevation(&self) -> Option<String> {
        if !self.os_family.is_posix() {
            return None;
        }
        match self.effective_uid {
            Some(0) | None => None,
            Some(_) => {
                let spec = CommandSpec::new("sudo").arg("--version").timeout(self.probe_timeout);
                if self.executor.probe(&spec).await {
                    Some("sudo".to_string())
                } else {
                    warn!("Not running as root and sudo is unavailable; privileged steps may fail");
                    None
                }
            }
        }
    }

    /// Runs a version query and returns its first output line on success
    async fn version_of(&self, spec: CommandSpec) -> Option<String> {
        let spec = spec.timeout(self.probe_timeout);
        match self.executor.execute(&spec).await {
            Ok(output) if output.success() => {
                // Python 2 prints its version on stderr
                let line = output
                    .first_line()
                    .map(str::to_string)
                    .or_else(|| output.stderr.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string))
                    .unwrap_or_default();
                Some(line)
            }
            Ok(output) => {
                debug!("{} exited with {:?}", spec, output.code);
                None
            }
            Err(e) if e.is_not_found() => {
                debug!("{} is not installed", spec.program);
                None
            }
            Err(e) => {
                debug!("{}: {}", spec, e);
                None
            }
        }
    }
}

#[cfg(unix)]
fn current_euid() -> Option<u32> {
    // SAFETY: geteuid has no preconditions and cannot fail
    Some(unsafe { libc::geteuid() })
}

#[cfg(not(unix))]
fn current_euid() -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_executor::{Reply, ScriptedExecutor};

    struct Fixture {
        _dir: tempfile::TempDir,
        os_release: PathBuf,
        marker: PathBuf,
    }

    fn fixture(os_release: &str, systemd: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, os_release).unwrap();
        let marker = dir.path().join("systemd");
        if systemd {
            std::fs::create_dir(&marker).unwrap();
        }
        Fixture { _dir: dir, os_release: path, marker }
    }

    fn linux_probe(exec: &ScriptedExecutor, fx: &Fixture, uid: Option<u32>) -> EnvironmentProbe {
        EnvironmentProbe::new(Arc::new(exec.clone()))
            .with_os_family(OsFamily::Linux)
            .with_os_release_path(&fx.os_release)
            .with_systemd_marker(&fx.marker)
            .with_effective_uid(uid)
    }

    #[tokio::test]
    async fn test_detects_full_ubuntu_profile() {
        let fx = fixture("ID=ubuntu\nVERSION_ID=\"22.04\"\n", true);
        let exec = ScriptedExecutor::new();
        exec.on(&["python3", "--version"], Reply::success("Python 3.10.12\n"));
        exec.on(&["pip3", "--version"], Reply::success("pip 22.0.2\n"));
        exec.on(&["systemctl", "--version"], Reply::success("systemd 249\n"));
        exec.on(&["sudo", "--version"], Reply::success("Sudo version 1.9.9\n"));

        let profile = linux_probe(&exec, &fx, Some(1000)).detect().await.unwrap();

        assert_eq!(profile.native_package_manager, NativePackageManager::Apt);
        assert_eq!(profile.runtime.program, "python3");
        assert_eq!(profile.runtime_version, "Python 3.10.12");
        assert_eq!(profile.package_manager.to_string(), "pip3");
        assert_eq!(profile.service_manager, Some(ServiceManager::Systemd));
        assert_eq!(profile.elevation.as_deref(), Some("sudo"));
        assert_eq!(profile.distribution.unwrap().version_id.as_deref(), Some("22.04"));
    }

    #[tokio::test]
    async fn test_falls_back_to_unversioned_runtime_and_module_pip() {
        let fx = fixture("ID=arch\n", false);
        let exec = ScriptedExecutor::new();
        exec.on(&["python", "--version"], Reply::success("Python 3.12.1"));
        exec.on(&["python", "-m", "pip", "--version"], Reply::success("pip 23.3"));

        let profile = linux_probe(&exec, &fx, Some(0)).detect().await.unwrap();

        assert_eq!(profile.runtime.program, "python");
        assert_eq!(profile.package_manager.to_string(), "python -m pip");
        assert_eq!(profile.service_manager, None);
        assert_eq!(profile.elevation, None);
        assert!(exec.was_called(&["python3", "--version"]));
    }

    #[tokio::test]
    async fn test_no_runtime_is_fatal() {
        let fx = fixture("ID=debian\n", false);
        let exec = ScriptedExecutor::new();

        let err = linux_probe(&exec, &fx, Some(0)).detect().await.unwrap_err();

        assert_eq!(
            err,
            EnvironmentError::RuntimeNotFound {
                candidates: vec!["python3".to_string(), "python".to_string()]
            }
        );
        assert!(!exec.was_called(&["pip3"]));
    }

    #[tokio::test]
    async fn test_unknown_distribution_is_fatal() {
        let fx = fixture("ID=plan9\n", false);
        let exec = ScriptedExecutor::new();
        exec.on(&["python3", "--version"], Reply::success("Python 3.11.0"));

        let err = linux_probe(&exec, &fx, Some(0)).detect().await.unwrap_err();

        assert_eq!(err, EnvironmentError::UnsupportedDistribution { id: "plan9".to_string() });
        // fails before any runtime probe
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_pip_is_fatal() {
        let fx = fixture("ID=fedora\n", false);
        let exec = ScriptedExecutor::new();
        exec.on(&["python3", "--version"], Reply::success("Python 3.12.0"));

        let err = linux_probe(&exec, &fx, Some(0)).detect().await.unwrap_err();

        match err {
            EnvironmentError::PackageManagerNotFound { runtime, candidates } => {
                assert_eq!(runtime, "python3");
                assert_eq!(candidates, vec!["pip3", "pip", "python3 -m pip"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_windows_profile() {
        let exec = ScriptedExecutor::new();
        exec.on(&["py", "--version"], Reply::success("Python 3.12.2"));
        exec.on(&["pip", "--version"], Reply::success("pip 24.0"));

        let profile = EnvironmentProbe::new(Arc::new(exec.clone()))
            .with_os_family(OsFamily::Windows)
            .with_effective_uid(None)
            .detect()
            .await
            .unwrap();

        assert_eq!(profile.native_package_manager, NativePackageManager::Winget);
        assert_eq!(profile.runtime.program, "py");
        assert!(profile.distribution.is_none());
        assert!(profile.service_manager.is_none());
        assert!(!exec.was_called(&["sudo"]));
    }
}
