//! Configuration manager
//!
//! Layers defaults, files, environment and command-line overrides into a
//! single validated [`ProvisionConfig`].

use std::path::PathBuf;
use tracing::{debug, info};

use common::error::Result;

use crate::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::schema::ProvisionConfig;
use crate::sources::{ConfigSource, EnvSource, FileSource};
use crate::validation::ConfigValidator;

/// Configuration manager
pub struct ConfigManager {
    /// Sources applied on top of the defaults, in order
    sources: Vec<Box<dyn ConfigSource>>,

    /// Validator run after all sources
    validator: ConfigValidator,
}

impl ConfigManager {
    /// Creates a manager with no sources; `load` then yields the defaults
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            validator: ConfigValidator::new(),
        }
    }

    /// Creates a manager with the standard layering: an explicit config file
    /// (or the per-user default file when present), then the environment
    pub fn standard(config_file: Option<PathBuf>) -> Self {
        let file = match config_file {
            Some(path) => FileSource::required(path),
            None => match Self::default_config_path() {
                Some(path) => FileSource::optional(path),
                None => return Self::new().with_source(EnvSource::from_process()),
            },
        };
        Self::new().with_source(file).with_source(EnvSource::from_process())
    }

    /// Per-user config file location, e.g. `~/.config/provisioner/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Appends a source; later sources win
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Applies every source and validates the result
    pub fn load(&self) -> Result<ProvisionConfig> {
        let mut config = ProvisionConfig::default();

        for source in &self.sources {
            debug!("Applying configuration from {}", source.describe());
            source.apply(&mut config)?;
        }

        self.validator.validate(&mut config)?;

        info!(
            "Configuration loaded: {} dependencies, {} models",
            config.dependencies.len(),
            config.models.len()
        );

        Ok(config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
