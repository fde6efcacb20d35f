//! # Stockbook Configuration
//!
//! Loads the application configuration from an optional `config.toml`, layered
//! with `STOCKBOOK_*` environment variables, and sets up logging.
//!
//! Every section has sensible defaults, so an empty file (or no file at all)
//! yields a working configuration for local runs.

use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
#[cfg(feature = "clap")]
pub mod cli;
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
#[cfg(feature = "clap")]
pub use cli::ConfigArgs;
pub use logging::init_tracing;
pub use settings::{
    AccountSettings, Config, DatabaseSettings, ExecutorSettings, LoggingSettings, OracleSettings,
};

const ENV_PREFIX: &str = "STOCKBOOK";

/// Loads the application configuration from `config.toml` in the working directory, if present.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(None)
}

/// Loads the application configuration from the given file, or from an optional
/// `config.toml` when no path is given.
///
/// Sources, lowest precedence first: the file, then `STOCKBOOK_*` environment
/// variables (`STOCKBOOK_EXECUTOR__MAX_ATTEMPTS=3` sets `executor.max_attempts`),
/// then the plain `DATABASE_URL` / `API_KEY` variables for values still unset.
pub fn load_config_from(path: Option<&Path>) -> Result<Config, ConfigError> {
    // A missing .env file is not an error; the variables may come from the shell.
    dotenvy::dotenv().ok();

    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("config").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;
    config.apply_env_fallbacks();
    config.validate()?;

    tracing::debug!(?path, "Configuration loaded.");
    Ok(config)
}

/// Parses a configuration from TOML text without consulting the environment.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(contents, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.executor.max_attempts, 5);
        assert_eq!(config.accounts.default_initial_cash, dec!(10000));
        assert_eq!(config.oracle.timeout_secs, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.database.url.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [executor]
            max_attempts = 3

            [accounts]
            default_initial_cash = 2500.50

            [oracle]
            base_url = "http://localhost:9000"
            api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.accounts.default_initial_cash, dec!(2500.50));
        assert_eq!(config.oracle.base_url, "http://localhost:9000");
        assert_eq!(config.oracle.api_key.as_deref(), Some("secret"));
        // Untouched sections keep their defaults.
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = parse_config("[executor]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn negative_starting_cash_is_rejected() {
        let err = parse_config("[accounts]\ndefault_initial_cash = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
