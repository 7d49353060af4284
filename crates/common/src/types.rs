//! Platform types shared by the provisioning stages
//!
//! A [`PlatformProfile`] is produced once by the environment probe and then
//! passed by reference to every later stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Windows
    Windows,
    /// Linux distributions
    Linux,
    /// macOS
    MacOs,
}

impl OsFamily {
    /// Detects the OS family of the running binary
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => OsFamily::Windows,
            "macos" => OsFamily::MacOs,
            _ => OsFamily::Linux,
        }
    }

    /// Returns true for every non-Windows family
    pub fn is_posix(&self) -> bool {
        !matches!(self, OsFamily::Windows)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "windows"),
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::MacOs => write!(f, "macos"),
        }
    }
}

/// Distribution identity read from the OS-release descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Distribution {
    /// `ID` field, lowercased
    pub id: String,
    /// `ID_LIKE` entries, lowercased
    pub id_like: Vec<String>,
    /// `VERSION_ID` field
    pub version_id: Option<String>,
    /// `PRETTY_NAME` field
    pub pretty_name: Option<String>,
}

/// Native package manager families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativePackageManager {
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Apk,
    Brew,
    Winget,
}

impl NativePackageManager {
    /// Command that refreshes the package index, if the manager has one
    pub fn refresh_command(&self) -> Option<CommandLine> {
        let (program, args): (&str, &[&str]) = match self {
            NativePackageManager::Apt => ("apt-get", &["update"]),
            NativePackageManager::Dnf => ("dnf", &["makecache"]),
            NativePackageManager::Pacman => ("pacman", &["-Sy"]),
            NativePackageManager::Zypper => ("zypper", &["--non-interactive", "refresh"]),
            NativePackageManager::Apk => ("apk", &["update"]),
            NativePackageManager::Brew => ("brew", &["update"]),
            NativePackageManager::Winget => return None,
        };
        Some(CommandLine::new(program, args))
    }

    /// Command that installs the given native packages
    pub fn install_command(&self, packages: &[String]) -> CommandLine {
        let (program, args): (&str, &[&str]) = match self {
            NativePackageManager::Apt => ("apt-get", &["install", "-y"]),
            NativePackageManager::Dnf => ("dnf", &["install", "-y"]),
            NativePackageManager::Pacman => ("pacman", &["-S", "--noconfirm", "--needed"]),
            NativePackageManager::Zypper => ("zypper", &["--non-interactive", "install"]),
            NativePackageManager::Apk => ("apk", &["add"]),
            NativePackageManager::Brew => ("brew", &["install"]),
            NativePackageManager::Winget => (
                "winget",
                &["install", "--silent", "--accept-package-agreements", "--accept-source-agreements"],
            ),
        };
        CommandLine::new(program, args).with_args(packages.iter().cloned())
    }

    /// Whether the manager must run with root privileges
    pub fn needs_elevation(&self) -> bool {
        !matches!(self, NativePackageManager::Brew | NativePackageManager::Winget)
    }
}

impl fmt::Display for NativePackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativePackageManager::Apt => "apt",
            NativePackageManager::Dnf => "dnf",
            NativePackageManager::Pacman => "pacman",
            NativePackageManager::Zypper => "zypper",
            NativePackageManager::Apk => "apk",
            NativePackageManager::Brew => "brew",
            NativePackageManager::Winget => "winget",
        };
        f.write_str(name)
    }
}

/// Service managers the provisioner knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceManager {
    Systemd,
}

/// A program plus leading arguments, e.g. `python3 -m pip`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line from a program and arguments
    pub fn new<S: AsRef<str>>(program: &str, args: &[S]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        }
    }

    /// Returns a copy with extra arguments appended
    pub fn with_args<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(extra.into_iter().map(Into::into));
        self
    }

    /// Returns a copy prefixed by an elevation program such as `sudo`
    pub fn elevated(self, prefix: Option<&str>) -> Self {
        match prefix {
            Some(prefix) => {
                let mut args = Vec::with_capacity(self.args.len() + 1);
                args.push(self.program);
                args.extend(self.args);
                Self { program: prefix.to_string(), args }
            }
            None => self,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything the later stages need to know about the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// OS family
    pub os_family: OsFamily,
    /// Distribution, on Linux and macOS
    pub distribution: Option<Distribution>,
    /// Native package manager
    pub native_package_manager: NativePackageManager,
    /// Interpreter runtime command
    pub runtime: CommandLine,
    /// Interpreter version as reported by `--version`
    pub runtime_version: String,
    /// Interpreter package manager command
    pub package_manager: CommandLine,
    /// Service manager, if one is usable
    pub service_manager: Option<ServiceManager>,
    /// Elevation prefix for privileged commands
    pub elevation: Option<String>,
}

impl PlatformProfile {
    /// Builds the package-manager invocation for the given arguments
    pub fn package_manager_command<I, S>(&self, args: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_manager.clone().with_args(args)
    }

    /// Elevation prefix as a string slice
    pub fn elevation(&self) -> Option<&str> {
        self.elevation.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevated_command_line() {
        let cmd = CommandLine::new("systemctl", &["start", "ollama"]).elevated(Some("sudo"));
        assert_eq!(cmd.to_string(), "sudo systemctl start ollama");

        let cmd = CommandLine::new("systemctl", &["start", "ollama"]).elevated(None);
        assert_eq!(cmd.to_string(), "systemctl start ollama");
    }

    #[test]
    fn test_native_install_command() {
        let cmd = NativePackageManager::Brew.install_command(&["ollama".to_string()]);
        assert_eq!(cmd.to_string(), "brew install ollama");
        assert!(NativePackageManager::Winget.refresh_command().is_none());
        assert!(!NativePackageManager::Brew.needs_elevation());
    }
}
