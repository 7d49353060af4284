//! Configuration schema
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it wants to change.

use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use common::models::{DeclaredDependencySet, DeclaredModelSet};

use crate::defaults::*;

/// Complete provisioner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Python packages to install, in order
    pub dependencies: Vec<String>,

    /// Models to pull, in order
    pub models: Vec<String>,

    /// Package installer settings
    pub packages: PackageSettings,

    /// Model-serving tool settings
    pub tool: ToolSettings,

    /// Model fetcher settings
    pub fetch: FetchSettings,
}

/// Package installer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageSettings {
    /// Always run `install --upgrade`, even for satisfied packages
    pub upgrade: bool,

    /// Refresh the native package index before installing
    pub refresh_system_index: bool,

    /// Ceiling for one install, in seconds
    pub install_timeout_secs: u64,

    /// Ceiling for version probes and `show` queries, in seconds
    pub query_timeout_secs: u64,
}

/// Model-serving tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Executable name
    pub program: String,

    /// Service unit name
    pub service_name: String,

    /// Install script URL for Linux
    pub install_url_posix: String,

    /// Installer URL for Windows
    pub install_url_windows: String,

    /// Arguments passed to the Windows installer
    pub windows_installer_args: Vec<String>,

    /// Directory the Windows installer puts the executable in
    pub windows_install_dir: Option<PathBuf>,

    /// Ceiling for the install procedure, in seconds
    pub install_timeout_secs: u64,

    /// Ceiling for downloading the install procedure, in seconds
    pub download_timeout_secs: u64,
}

/// Model fetcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Bypass the model fetcher entirely
    pub skip: bool,

    /// Per-model pull ceiling, in seconds
    pub pull_timeout_secs: u64,

    /// Delay before the first pull, in seconds
    pub settle_delay_secs: u64,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            dependencies: owned(DEFAULT_DEPENDENCIES),
            models: owned(DEFAULT_MODELS),
            packages: PackageSettings::default(),
            tool: ToolSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            upgrade: false,
            refresh_system_index: false,
            install_timeout_secs: DEFAULT_PACKAGE_INSTALL_TIMEOUT_SECS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_TOOL_PROGRAM.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            install_url_posix: DEFAULT_INSTALL_URL_POSIX.to_string(),
            install_url_windows: DEFAULT_INSTALL_URL_WINDOWS.to_string(),
            windows_installer_args: owned(DEFAULT_WINDOWS_INSTALLER_ARGS),
            windows_install_dir: None,
            install_timeout_secs: DEFAULT_TOOL_INSTALL_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            skip: false,
            pull_timeout_secs: DEFAULT_PULL_TIMEOUT_SECS,
            settle_delay_secs: DEFAULT_SETTLE_DELAY_SECS,
        }
    }
}

impl ProvisionConfig {
    /// Declared dependency set, in order
    pub fn declared_dependencies(&self) -> DeclaredDependencySet {
        DeclaredDependencySet::new(self.dependencies.iter().cloned())
    }

    /// Declared model set, in order
    pub fn declared_models(&self) -> DeclaredModelSet {
        DeclaredModelSet::new(self.models.iter().cloned())
    }
}

impl PackageSettings {
    /// Install timeout
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    /// Query timeout
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl ToolSettings {
    /// Install procedure timeout
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    /// Download timeout
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Full path of the executable installed by the Windows installer
    ///
    /// The installer only extends `PATH` for new sessions, so the running
    /// process has to look for the binary where it was put.
    pub fn windows_executable(&self) -> Option<PathBuf> {
        let dir = match &self.windows_install_dir {
            Some(dir) => dir.clone(),
            None => WINDOWS_INSTALL_SUBDIR
                .iter()
                .fold(dirs::data_local_dir()?, |dir, part| dir.join(part)),
        };
        Some(dir.join(format!("{}.exe", self.program)))
    }
}

impl FetchSettings {
    /// Per-model pull timeout
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_secs(self.pull_timeout_secs)
    }

    /// Settle delay before the first pull
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}
