use crate::error::OracleError;
use crate::PriceOracle;
use async_trait::async_trait;
use core_types::{normalize_symbol, CoreError, Quote};
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An in-memory price table.
///
/// Prices can be changed and symbols taken offline while other tasks are
/// quoting, which makes it the oracle of choice for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    quotes: DashMap<String, Quote>,
    unavailable: DashSet<String>,
    requests: AtomicUsize,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, quote: Quote) -> Self {
        self.set_quote(quote);
        self
    }

    pub fn set_quote(&self, quote: Quote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Updates the price of `symbol`, keeping its name if it was already listed.
    pub fn set_price(&self, symbol: &str, price: Decimal) -> Result<(), CoreError> {
        let symbol = normalize_symbol(symbol)?;
        let name = self
            .quotes
            .get(&symbol)
            .map(|quote| quote.name.clone())
            .unwrap_or_else(|| symbol.clone());
        self.set_quote(Quote::new(&symbol, name, price)?);
        Ok(())
    }

    /// Makes every lookup of `symbol` fail with `Unavailable` until `restore` is called.
    pub fn mark_unavailable(&self, symbol: &str) -> Result<(), CoreError> {
        self.unavailable.insert(normalize_symbol(symbol)?);
        Ok(())
    }

    pub fn restore(&self, symbol: &str) -> Result<(), CoreError> {
        self.unavailable.remove(&normalize_symbol(symbol)?);
        Ok(())
    }

    /// Number of lookups served so far, successful or not.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn quote(&self, symbol: &str) -> Result<Quote, OracleError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let symbol = normalize_symbol(symbol).map_err(|e| OracleError::NotFound(e.to_string()))?;

        if self.unavailable.contains(&symbol) {
            return Err(OracleError::Unavailable(format!(
                "{} is not being quoted right now",
                symbol
            )));
        }
        self.quotes
            .get(&symbol)
            .map(|quote| quote.value().clone())
            .ok_or(OracleError::NotFound(symbol))
    }
}
