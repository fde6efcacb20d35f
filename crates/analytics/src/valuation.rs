use crate::error::ValuationError;
use crate::report::{PositionQuote, PositionValue, Valuation};
use api_client::PriceOracle;
use chrono::Utc;
use core_types::{AccountId, Quote};
use futures::future::join_all;
use ledger::{AccountLedger, LedgerStore};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Prices an account's holdings at the oracle's current quotes.
///
/// The engine only reads: it takes one consistent view of the ledger and
/// never writes back to it.
#[derive(Clone)]
pub struct ValuationEngine {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
}

impl ValuationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { store, oracle }
    }

    /// Values every held position concurrently.
    ///
    /// A symbol the oracle cannot price is reported as `Unavailable` and left out
    /// of `net_worth`; the other positions are still valued.
    pub async fn valuation(&self, account_id: AccountId) -> Result<Valuation, ValuationError> {
        let ledger = self.store.ledger_view(account_id).await?;
        let holdings = net_positions(&ledger)?;

        let quotes = join_all(holdings.keys().map(|symbol| self.oracle.quote(symbol))).await;

        let mut positions = Vec::with_capacity(holdings.len());
        let mut holdings_value = Decimal::ZERO;
        for ((symbol, shares), quote) in holdings.into_iter().zip(quotes) {
            let quote = match quote {
                Ok(quote) => price_position(shares, quote),
                Err(err) => {
                    tracing::warn!(account_id, %symbol, "Position left unpriced: {}", err);
                    PositionQuote::Unavailable {
                        reason: err.to_string(),
                    }
                }
            };
            if let PositionQuote::Priced { market_value, .. } = &quote {
                holdings_value = holdings_value.checked_add(*market_value).ok_or_else(|| {
                    ValuationError::Calculation("holdings value overflows".to_string())
                })?;
            }
            positions.push(PositionValue {
                symbol,
                shares,
                quote,
            });
        }

        let net_worth = ledger
            .account
            .cash
            .checked_add(holdings_value)
            .ok_or_else(|| ValuationError::Calculation("net worth overflows".to_string()))?;
        let contributions = ledger
            .adjustments
            .iter()
            .try_fold(ledger.account.initial_cash, |total, adjustment| {
                total.checked_add(adjustment.amount)
            })
            .ok_or_else(|| ValuationError::Calculation("contributions overflow".to_string()))?;

        let valuation = Valuation {
            account_id,
            cash: ledger.account.cash,
            positions,
            holdings_value,
            net_worth,
            contributions,
            as_of: Utc::now(),
        };
        tracing::debug!(
            account_id,
            net_worth = %valuation.net_worth,
            partial = valuation.is_partial(),
            "Valuation computed."
        );
        Ok(valuation)
    }
}

/// Net shares per symbol, dropping symbols that net to zero.
fn net_positions(ledger: &AccountLedger) -> Result<BTreeMap<String, i64>, ValuationError> {
    let mut positions: BTreeMap<String, i64> = BTreeMap::new();
    for entry in &ledger.entries {
        let shares = positions.entry(entry.symbol.clone()).or_insert(0);
        *shares = shares.checked_add(entry.quantity_delta).ok_or_else(|| {
            ValuationError::Calculation(format!("position in {} overflows", entry.symbol))
        })?;
    }
    positions.retain(|_, shares| *shares != 0);
    Ok(positions)
}

fn price_position(shares: i64, quote: Quote) -> PositionQuote {
    match Decimal::from(shares).checked_mul(quote.price) {
        Some(market_value) => PositionQuote::Priced {
            name: quote.name,
            price: quote.price,
            market_value,
        },
        None => PositionQuote::Unavailable {
            reason: format!("{} shares at {} overflows", shares, quote.price),
        },
    }
}
