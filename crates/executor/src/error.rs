use api_client::error::OracleError;
use core_types::{AccountId, CoreError};
use ledger::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// The kind of every outcome a trade request can end in other than a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Malformed or missing input. The user must resubmit.
    Validation,
    /// The oracle could not resolve a price.
    QuoteUnavailable,
    InsufficientFunds,
    InsufficientShares,
    /// The store failed, or conflicts outlasted the retry budget.
    Persistence,
}

/// A business-rule or input refusal. The ledger is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum Rejection {
    #[error("Invalid trade request: {reason}")]
    Validation { reason: String },

    #[error("No price available for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("Not enough cash to buy {shares} {symbol}. Required: {required}, Available: {available}")]
    InsufficientFunds {
        symbol: String,
        shares: i64,
        required: Decimal,
        available: Decimal,
    },

    #[error("Not enough {symbol} shares to sell. Requested: {requested}, Available: {available}")]
    InsufficientShares {
        symbol: String,
        requested: i64,
        available: i64,
    },
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Rejection::Validation { .. } => ErrorKind::Validation,
            Rejection::QuoteUnavailable { .. } => ErrorKind::QuoteUnavailable,
            Rejection::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Rejection::InsufficientShares { .. } => ErrorKind::InsufficientShares,
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Rejection::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn quote_unavailable(symbol: &str, err: &OracleError) -> Self {
        Rejection::QuoteUnavailable {
            symbol: symbol.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<CoreError> for Rejection {
    fn from(err: CoreError) -> Self {
        Rejection::validation(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Ledger store failure: {0}")]
    Persistence(#[from] LedgerError),

    #[error("Account {account_id} kept changing; gave up after {attempts} commit attempts.")]
    ConflictRetriesExhausted { account_id: AccountId, attempts: u32 },

    #[error("An unexpected portfolio state was encountered: {0}")]
    PortfolioError(String),
}

impl ExecutorError {
    /// Store conflicts are retried inside the executor, so every error that
    /// reaches a caller is a persistence failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Persistence
    }
}
