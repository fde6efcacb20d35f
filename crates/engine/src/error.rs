use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Price oracle error: {0}")]
    Oracle(#[from] api_client::error::OracleError),

    #[error("Valuation error: {0}")]
    Valuation(#[from] analytics::ValuationError),
}

impl From<core_types::CoreError> for EngineError {
    fn from(err: core_types::CoreError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
