use crate::error::OracleError;
use async_trait::async_trait;
use configuration::OracleSettings;
use core_types::{normalize_symbol, Quote};
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub mod error;
pub mod responses;
pub mod static_oracle;
// --- Public API ---
pub use responses::QuoteResponse;
pub use static_oracle::StaticPriceOracle;

/// The generic, abstract interface for a market-price source.
/// This trait is the contract the trade executor and the valuation engine use,
/// allowing the underlying implementation (HTTP or in-memory) to be swapped out.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Resolves `symbol` to its current quote.
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError>;
}

/// A concrete implementation of the `PriceOracle` backed by an IEX-style quote API.
#[derive(Clone)]
pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpPriceOracle {
    pub fn new(settings: &OracleSettings) -> Result<Self, OracleError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            OracleError::InvalidConfiguration(format!("invalid base URL '{}': {}", settings.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(OracleError::InvalidConfiguration(format!(
                "base URL '{}' cannot carry a path",
                settings.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| OracleError::InvalidConfiguration(e.to_string()))?;

        if settings.api_key.is_none() {
            tracing::warn!("No oracle API key configured; quote requests will be unauthenticated.");
        }

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// Builds `{base_url}/stock/{symbol}/quote?token={api_key}`, escaping the symbol.
    fn quote_url(&self, symbol: &str) -> Result<Url, OracleError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OracleError::InvalidConfiguration(format!(
                    "base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["stock", symbol, "quote"]);
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("token", key);
        }
        Ok(url)
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError> {
        let symbol = normalize_symbol(symbol).map_err(|e| OracleError::NotFound(e.to_string()))?;
        let url = self.quote_url(&symbol)?;

        tracing::debug!(%symbol, "Requesting quote.");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Unavailable(format!("quote request for {} timed out", symbol))
            } else {
                OracleError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(OracleError::NotFound(symbol));
        }
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!(
                "quote API returned {} for {}",
                status, symbol
            )));
        }

        let body = response
            .json::<QuoteResponse>()
            .await
            .map_err(|e| OracleError::Unavailable(format!("malformed quote for {}: {}", symbol, e)))?;
        body.into_quote(&symbol)
    }
}
