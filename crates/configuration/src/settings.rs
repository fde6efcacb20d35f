use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub oracle: OracleSettings,
    pub executor: ExecutorSettings,
    pub accounts: AccountSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Fills credentials still unset from the plain `DATABASE_URL` and `API_KEY` variables.
    pub fn apply_env_fallbacks(&mut self) {
        if self.database.url.is_none() {
            self.database.url = std::env::var("DATABASE_URL").ok();
        }
        if self.oracle.api_key.is_none() {
            self.oracle.api_key = std::env::var("API_KEY").ok();
        }
    }

    /// Checks the cross-field rules that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "executor.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.accounts.default_initial_cash.is_sign_negative() {
            return Err(ConfigError::ValidationError(format!(
                "accounts.default_initial_cash must not be negative, got {}",
                self.accounts.default_initial_cash
            )));
        }
        if self.oracle.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "oracle.base_url must not be empty".to_string(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "oracle.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the PostgreSQL ledger store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Falls back to the `DATABASE_URL` environment variable when unset.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

/// Settings for the HTTP price oracle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Base URL of the quote API. Quotes are fetched from `{base_url}/stock/{symbol}/quote`.
    pub base_url: String,
    /// Falls back to the `API_KEY` environment variable when unset.
    pub api_key: Option<String>,
    /// Per-request timeout. A timed-out quote aborts the trade with no state change.
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: "https://cloud.iexapis.com/stable".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }
}

/// Contains parameters for the trade executor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// How many validate-and-commit rounds a trade gets before a persistent
    /// conflict is surfaced as a persistence failure.
    pub max_attempts: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    /// Cash granted to a newly registered account when none is specified.
    pub default_initial_cash: Decimal,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            default_initial_cash: dec!(10000.00),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, used when `RUST_LOG` is not set.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "stockbook.log".to_string(),
        }
    }
}
