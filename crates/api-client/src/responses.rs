use crate::error::OracleError;
use core_types::Quote;
use rust_decimal::Decimal;
use serde::Deserialize;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The response from a successful `GET /stock/{symbol}/quote` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub symbol: Option<String>,
    pub company_name: Option<String>,
    /// Absent or null for instruments that have never traded.
    pub latest_price: Option<Decimal>,
    // There are more fields, but these are the only ones the ledger needs.
}

impl QuoteResponse {
    /// Converts the response into a `Quote` for `requested`, the normalized symbol
    /// that was asked for. A missing or non-positive price means there is no quote.
    pub fn into_quote(self, requested: &str) -> Result<Quote, OracleError> {
        let price = match self.latest_price {
            Some(price) if price > Decimal::ZERO => price,
            _ => return Err(OracleError::NotFound(requested.to_string())),
        };
        let name = self
            .company_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| requested.to_string());

        Quote::new(requested, name, price).map_err(|e| OracleError::NotFound(e.to_string()))
    }
}
