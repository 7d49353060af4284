//! Built-in defaults
//!
//! The declared sets here are used whenever no file or flag overrides them.

/// Python packages required by the document translation toolchain
pub const DEFAULT_DEPENDENCIES: &[&str] = &[
    "pdfplumber",
    "docx2pdf",
    "transformers",
    "torch",
    "sentencepiece",
];

/// Models pulled through the model-serving tool
pub const DEFAULT_MODELS: &[&str] = &["llama3.1:8b", "mistral:7b"];

/// Model-serving tool executable
pub const DEFAULT_TOOL_PROGRAM: &str = "ollama";

/// Service unit name of the model-serving tool
pub const DEFAULT_SERVICE_NAME: &str = "ollama";

/// Install script for Linux
pub const DEFAULT_INSTALL_URL_POSIX: &str = "https://ollama.com/install.sh";

/// Installer executable for Windows
pub const DEFAULT_INSTALL_URL_WINDOWS: &str = "https://ollama.com/download/OllamaSetup.exe";

/// Install location of the Windows installer, under the local app data dir
pub const WINDOWS_INSTALL_SUBDIR: &[&str] = &["Programs", "Ollama"];

/// Arguments for an unattended Windows install
pub const DEFAULT_WINDOWS_INSTALLER_ARGS: &[&str] = &["/VERYSILENT", "/NORESTART", "/SUPPRESSMSGBOXES"];

/// Per-model pull ceiling, in seconds
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 300;

/// Delay between the service step and the first pull, in seconds
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 3;

/// Ceiling for one package install, in seconds
pub const DEFAULT_PACKAGE_INSTALL_TIMEOUT_SECS: u64 = 1800;

/// Ceiling for version probes and `show`/`list` queries, in seconds
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Ceiling for the tool's remote install procedure, in seconds
pub const DEFAULT_TOOL_INSTALL_TIMEOUT_SECS: u64 = 900;

/// Ceiling for downloading the install procedure, in seconds
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "provisioner";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PROVISIONER_";
