use crate::error::ConfigError;
use crate::settings::Config;
use std::path::PathBuf;

/// Command-line flags shared by every subcommand for locating configuration.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file. Defaults to `config.toml`, if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured log filter (e.g. `debug` or `executor=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = crate::load_config_from(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        Ok(config)
    }
}
