use core_types::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The account changed between the caller's read and the attempted commit.
    /// Nothing was written.
    #[error("Account {account_id} changed since it was read: {reason}")]
    Conflict { account_id: AccountId, reason: String },

    #[error("Account {0} does not exist.")]
    AccountNotFound(AccountId),

    #[error("Username '{0}' is already taken.")]
    DuplicateUsername(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("The ledger store failed: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Whether the caller may re-read and try again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}
