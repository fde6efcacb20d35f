use ledger::LedgerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Could not read the ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
