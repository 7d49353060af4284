//! Command-line arguments

use std::path::PathBuf;
use clap::{ArgAction, Parser};

use config::{ConfigManager, ListFileSource, ListTarget};
use logging::{LogConfig, LogFormat};

use crate::overrides::CliOverrides;

/// Provisioner command line
#[derive(Parser, Debug, Clone)]
#[command(
    name = "provisioner",
    version,
    about = "Install Python packages, the Ollama model server and its models, then report what is present"
)]
pub struct Cli {
    #[arg(long, help = "Do not pull any models")]
    pub skip_models: bool,

    #[arg(long, value_name = "SECS", help = "Per-model pull timeout in seconds [default: 300]")]
    pub timeout: Option<u64>,

    #[arg(long, value_name = "FILE", help = "Package list, one identifier per line")]
    pub dependencies: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Model list, one <name>:<tag> per line")]
    pub models: Option<PathBuf>,

    #[arg(long, value_name = "FILE", env = "PROVISIONER_CONFIG", help = "Config file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Always run the package manager with --upgrade")]
    pub upgrade: bool,

    #[arg(long, help = "Refresh the native package index before installing")]
    pub system_update: bool,

    #[arg(long, value_name = "SECS", help = "Delay before the first model pull [default: 3]")]
    pub settle_delay: Option<u64>,

    #[arg(long, help = "Print the report as JSON")]
    pub json: bool,

    #[arg(long, help = "Disable coloured output")]
    pub no_color: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv)")]
    pub verbose: u8,

    #[arg(short, long, conflicts_with = "verbose", help = "Only log warnings and errors")]
    pub quiet: bool,

    #[arg(long, value_name = "FORMAT", default_value = "pretty", help = "Log format: pretty, compact or json")]
    pub log_format: LogFormat,

    #[arg(long, value_name = "FILE", help = "Also write logs to this file")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging options selected on the command line
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            verbosity: self.verbose,
            quiet: self.quiet,
            format: self.log_format,
            file: self.log_file.clone(),
        }
    }

    /// Builds the configuration layering for this invocation
    ///
    /// Defaults, then the config file, then `PROVISIONER_*` variables,
    /// then list files, then flags.
    pub fn config_manager(&self) -> ConfigManager {
        let mut manager = ConfigManager::standard(self.config.clone());
        if let Some(path) = &self.dependencies {
            manager = manager.with_source(ListFileSource::new(path.clone(), ListTarget::Dependencies));
        }
        if let Some(path) = &self.models {
            manager = manager.with_source(ListFileSource::new(path.clone(), ListTarget::Models));
        }
        manager.with_source(CliOverrides::from(self))
    }

    /// Whether the report should be coloured
    pub fn use_color(&self) -> bool {
        !self.no_color && !self.json && console::colors_enabled()
    }
}
