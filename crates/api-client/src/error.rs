use thiserror::Error;

/// The outcomes of a quote lookup other than a price.
///
/// Both are terminal for a single call; any retry policy for `Unavailable`
/// belongs to the caller of the oracle, not to the trade path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No quote exists for symbol '{0}'.")]
    NotFound(String),

    #[error("The quote source is unavailable: {0}")]
    Unavailable(String),

    #[error("The price oracle is misconfigured: {0}")]
    InvalidConfiguration(String),
}

impl OracleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, OracleError::NotFound(_))
    }
}
