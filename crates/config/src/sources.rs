//! Configuration sources
//!
//! Sources are applied in order on top of the built-in defaults; later
//! sources win.

use std::path::{Path, PathBuf};
use tracing::debug;

use common::error::{Error, Result};
use common::utils::parse_bool_flag;

use crate::defaults::ENV_PREFIX;
use crate::schema::ProvisionConfig;

/// Something that can modify a configuration
pub trait ConfigSource: Send + Sync {
    /// Applies this source's values
    fn apply(&self, config: &mut ProvisionConfig) -> Result<()>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    /// Guesses the format from the file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }
}

/// A complete config file in TOML, YAML or JSON
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// A file that must exist
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), required: true }
    }

    /// A file that is skipped when missing
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), required: false }
    }

    /// Parses config text in the given format
    pub fn parse(text: &str, format: FileFormat) -> Result<ProvisionConfig> {
        match format {
            FileFormat::Toml => toml::from_str(text).map_err(|e| Error::Config(e.to_string())),
            FileFormat::Yaml => serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string())),
            FileFormat::Json => serde_json::from_str(text).map_err(|e| Error::Config(e.to_string())),
        }
    }
}

impl ConfigSource for FileSource {
    fn apply(&self, config: &mut ProvisionConfig) -> Result<()> {
        if !self.path.exists() {
            if self.required {
                return Err(Error::Config(format!("config file {} does not exist", self.path.display())));
            }
            debug!("Optional config file {} not present", self.path.display());
            return Ok(());
        }

        let text = std::fs::read_to_string(&self.path)?;
        *config = Self::parse(&text, FileFormat::from_path(&self.path))
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Which declared list a list file replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Dependencies,
    Models,
}

/// A plain list file: one identifier per line, `#` starts a comment
#[derive(Debug, Clone)]
pub struct ListFileSource {
    path: PathBuf,
    target: ListTarget,
}

impl ListFileSource {
    /// Creates a list source replacing the given target
    pub fn new(path: impl Into<PathBuf>, target: ListTarget) -> Self {
        Self { path: path.into(), target }
    }

    /// Parses list text
    pub fn parse(text: &str) -> Vec<String> {
        text.lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ConfigSource for ListFileSource {
    fn apply(&self, config: &mut ProvisionConfig) -> Result<()> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", self.path.display(), e)))?;
        let items = Self::parse(&text);
        match self.target {
            ListTarget::Dependencies => config.dependencies = items,
            ListTarget::Models => config.models = items,
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("list file {}", self.path.display())
    }
}

/// `PROVISIONER_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: Vec<(String, String)>,
}

impl EnvSource {
    /// Captures the process environment
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Uses the given variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(k, _)| k.starts_with(ENV_PREFIX))
                .collect(),
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{} must be a whole number of seconds, got '{}'", key, value)))
}

impl ConfigSource for EnvSource {
    fn apply(&self, config: &mut ProvisionConfig) -> Result<()> {
        for (key, value) in &self.vars {
            let name = &key[ENV_PREFIX.len()..];
            match name {
                "PULL_TIMEOUT" => config.fetch.pull_timeout_secs = parse_secs(key, value)?,
                "SETTLE_DELAY" => config.fetch.settle_delay_secs = parse_secs(key, value)?,
                "SKIP_MODELS" => config.fetch.skip = parse_bool_flag(value),
                "UPGRADE" => config.packages.upgrade = parse_bool_flag(value),
                "SYSTEM_UPDATE" => config.packages.refresh_system_index = parse_bool_flag(value),
                "TOOL_PROGRAM" => config.tool.program = value.trim().to_string(),
                "INSTALL_URL" => config.tool.install_url_posix = value.trim().to_string(),
                "INSTALL_URL_WINDOWS" => config.tool.install_url_windows = value.trim().to_string(),
                _ => {
                    debug!("Ignoring unknown environment override {}", key);
                    continue;
                }
            }
            debug!("Applied environment override {}", key);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "environment".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FileSource::parse("models = [\"phi3:mini\"]\n[fetch]\npull_timeout_secs = 60\n", FileFormat::Toml)
            .unwrap();
        assert_eq!(config.models, vec!["phi3:mini"]);
        assert_eq!(config.fetch.pull_timeout_secs, 60);
        assert_eq!(config.dependencies, ProvisionConfig::default().dependencies);
    }

    #[test]
    fn test_yaml_and_json_formats() {
        let yaml = FileSource::parse("dependencies:\n  - alpha\n  - beta\n", FileFormat::Yaml).unwrap();
        assert_eq!(yaml.dependencies, vec!["alpha", "beta"]);

        let json = FileSource::parse(r#"{"fetch": {"skip": true}}"#, FileFormat::Json).unwrap();
        assert!(json.fetch.skip);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = FileSource::parse("colour = true\n", FileFormat::Toml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.yml")), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.JSON")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a")), FileFormat::Toml);
    }

    #[test]
    fn test_list_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# models\nm1:tag\n\n  m2:tag   # second\n").unwrap();

        let mut config = ProvisionConfig::default();
        ListFileSource::new(file.path(), ListTarget::Models).apply(&mut config).unwrap();

        assert_eq!(config.models, vec!["m1:tag", "m2:tag"]);
    }

    #[test]
    fn test_missing_required_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProvisionConfig::default();

        let err = FileSource::required(dir.path().join("nope.toml")).apply(&mut config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        FileSource::optional(dir.path().join("nope.toml")).apply(&mut config).unwrap();
        assert_eq!(config, ProvisionConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env = EnvSource::from_vars([
            ("PROVISIONER_PULL_TIMEOUT", "42"),
            ("PROVISIONER_SKIP_MODELS", "yes"),
            ("HOME", "/root"),
        ]);
        let mut config = ProvisionConfig::default();
        env.apply(&mut config).unwrap();

        assert_eq!(config.fetch.pull_timeout_secs, 42);
        assert!(config.fetch.skip);

        let bad = EnvSource::from_vars([("PROVISIONER_SETTLE_DELAY", "soon")]);
        assert!(bad.apply(&mut config).is_err());
    }
}
