//! Command-line configuration overrides

use common::error::Result;
use config::{ConfigSource, ProvisionConfig};

use crate::cli::Cli;

/// Flags that override configuration values; unset flags change nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub skip_models: bool,
    pub pull_timeout_secs: Option<u64>,
    pub settle_delay_secs: Option<u64>,
    pub upgrade: bool,
    pub system_update: bool,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            skip_models: cli.skip_models,
            pull_timeout_secs: cli.timeout,
            settle_delay_secs: cli.settle_delay,
            upgrade: cli.upgrade,
            system_update: cli.system_update,
        }
    }
}

impl ConfigSource for CliOverrides {
    fn apply(&self, config: &mut ProvisionConfig) -> Result<()> {
        if self.skip_models {
            config.fetch.skip = true;
        }
        if let Some(secs) = self.pull_timeout_secs {
            config.fetch.pull_timeout_secs = secs;
        }
        if let Some(secs) = self.settle_delay_secs {
            config.fetch.settle_delay_secs = secs;
        }
        if self.upgrade {
            config.packages.upgrade = true;
        }
        if self.system_update {
            config.packages.refresh_system_index = true;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "command line".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_flags_keep_values() {
        let mut config = ProvisionConfig::default();
        config.fetch.skip = true;
        config.fetch.pull_timeout_secs = 90;

        CliOverrides::default().apply(&mut config).unwrap();

        assert!(config.fetch.skip);
        assert_eq!(config.fetch.pull_timeout_secs, 90);
    }

    #[test]
    fn test_set_flags_win() {
        let mut config = ProvisionConfig::default();
        let overrides = CliOverrides {
            skip_models: true,
            pull_timeout_secs: Some(10),
            settle_delay_secs: Some(0),
            upgrade: true,
            system_update: true,
        };

        overrides.apply(&mut config).unwrap();

        assert!(config.fetch.skip);
        assert_eq!(config.fetch.pull_timeout_secs, 10);
        assert_eq!(config.fetch.settle_delay_secs, 0);
        assert!(config.packages.upgrade);
        assert!(config.packages.refresh_system_index);
    }
}
