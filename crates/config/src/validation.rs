//! Configuration validation
//!
//! Rejects values later stages cannot act on and removes duplicate
//! identifiers from the declared sets.

use tracing::warn;

use common::error::{Error, Result};

use crate::schema::ProvisionConfig;

/// Validator for a loaded configuration
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validates the configuration, de-duplicating declared sets in place
    pub fn validate(&self, config: &mut ProvisionConfig) -> Result<()> {
        config.dependencies = Self::dedupe("dependency", &config.dependencies);
        config.models = Self::dedupe("model", &config.models);

        for dep in &config.dependencies {
            Self::validate_dependency(dep)?;
        }
        for model in &config.models {
            Self::validate_model(model)?;
        }

        if config.tool.program.trim().is_empty() {
            return Err(Error::Config("tool.program must not be empty".to_string()));
        }
        Self::validate_url("tool.install_url_posix", &config.tool.install_url_posix)?;
        Self::validate_url("tool.install_url_windows", &config.tool.install_url_windows)?;

        let timeouts = [
            ("fetch.pull_timeout_secs", config.fetch.pull_timeout_secs),
            ("packages.install_timeout_secs", config.packages.install_timeout_secs),
            ("packages.query_timeout_secs", config.packages.query_timeout_secs),
            ("tool.install_timeout_secs", config.tool.install_timeout_secs),
            ("tool.download_timeout_secs", config.tool.download_timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }

    fn dedupe(kind: &str, items: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim().to_string();
            if out.contains(&item) {
                warn!("Ignoring duplicate {} '{}'", kind, item);
                continue;
            }
            out.push(item);
        }
        out
    }

    /// Validates a pip requirement specifier
    ///
    /// Names start and end with an ASCII letter or digit, so nothing that
    /// reaches `pip install` can be read as an option.
    pub fn validate_dependency(dep: &str) -> Result<()> {
        let name = common::utils::requirement_name(dep);
        if name.is_empty() {
            return Err(Error::Config(format!("invalid dependency '{}'", dep)));
        }
        let bounded = name.starts_with(|c: char| c.is_ascii_alphanumeric())
            && name.ends_with(|c: char| c.is_ascii_alphanumeric());
        if !bounded || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(Error::Config(format!("invalid dependency name '{}'", name)));
        }
        Ok(())
    }

    /// Validates a `<name>[:<tag>]` model identifier
    pub fn validate_model(model: &str) -> Result<()> {
        if !model.starts_with(|c: char| c.is_ascii_alphanumeric()) || model.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!("invalid model identifier '{}'", model)));
        }
        let mut parts = model.split(':');
        let name = parts.next().unwrap_or_default();
        let tag = parts.next();
        if name.is_empty() || tag.map_or(false, str::is_empty) || parts.next().is_some() {
            return Err(Error::Config(format!(
                "invalid model identifier '{}', expected <name>:<tag>",
                model
            )));
        }
        Ok(())
    }

    fn validate_url(name: &str, url: &str) -> Result<()> {
        if !url.starts_with("https://") {
            return Err(Error::Config(format!("{} must be an https:// URL, got '{}'", name, url)));
        }
        Ok(())
    }
}
