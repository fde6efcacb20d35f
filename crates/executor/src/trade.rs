use crate::error::{ErrorKind, ExecutorError, Rejection};
use crate::portfolio::{Aggregator, Portfolio, StoreAggregator};
use api_client::PriceOracle;
use configuration::ExecutorSettings;
use core_types::{normalize_symbol, AccountId, EntryDraft, LedgerEntry, Quote, TradeSide, TradeState};
use ledger::{LedgerError, LedgerStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A buy or sell of a whole number of shares, as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub account_id: AccountId,
    pub side: TradeSide,
    /// Raw symbol; normalized by the executor.
    pub symbol: String,
    /// Must be at least 1.
    pub shares: i64,
}

impl TradeRequest {
    pub fn buy(account_id: AccountId, symbol: impl Into<String>, shares: i64) -> Self {
        Self {
            account_id,
            side: TradeSide::Buy,
            symbol: symbol.into(),
            shares,
        }
    }

    pub fn sell(account_id: AccountId, symbol: impl Into<String>, shares: i64) -> Self {
        Self {
            account_id,
            side: TradeSide::Sell,
            symbol: symbol.into(),
            shares,
        }
    }
}

/// The terminal outcome of a trade request.
#[derive(Debug)]
pub enum TradeResult {
    /// The entry is durable and visible to every later read.
    Committed(LedgerEntry),
    /// Refused on input or business rules. Nothing was written.
    Rejected(Rejection),
    /// The store failed or conflicts outlasted the retry budget. Nothing was written.
    Failed(ExecutorError),
}

impl TradeResult {
    pub fn state(&self) -> TradeState {
        match self {
            TradeResult::Committed(_) => TradeState::Committed,
            TradeResult::Rejected(_) => TradeState::Rejected,
            TradeResult::Failed(_) => TradeState::Failed,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, TradeResult::Committed(_))
    }

    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            TradeResult::Committed(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TradeResult::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// The error kind of a non-committed outcome.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            TradeResult::Committed(_) => None,
            TradeResult::Rejected(rejection) => Some(rejection.kind()),
            TradeResult::Failed(err) => Some(err.kind()),
        }
    }
}

/// Validates trade requests against a consistent portfolio view and commits
/// them through the ledger's compare-and-append.
///
/// The quote is fetched once per request, before any commit attempt, and is
/// reused across retries. A conflicting commit writes nothing, so a retry
/// simply re-reads the portfolio and validates again.
#[derive(Clone)]
pub struct TradeExecutor {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    aggregator: Arc<dyn Aggregator>,
    settings: ExecutorSettings,
}

impl TradeExecutor {
    /// Creates an executor that reads portfolios through the store's own snapshot.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        settings: ExecutorSettings,
    ) -> Self {
        let aggregator = Arc::new(StoreAggregator::new(store.clone()));
        Self::with_aggregator(store, oracle, aggregator, settings)
    }

    pub fn with_aggregator(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        aggregator: Arc<dyn Aggregator>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            store,
            oracle,
            aggregator,
            settings,
        }
    }

    pub async fn buy(&self, account_id: AccountId, symbol: &str, shares: i64) -> TradeResult {
        self.execute(TradeRequest::buy(account_id, symbol, shares)).await
    }

    pub async fn sell(&self, account_id: AccountId, symbol: &str, shares: i64) -> TradeResult {
        self.execute(TradeRequest::sell(account_id, symbol, shares)).await
    }

    /// Runs one request to a terminal state.
    pub async fn execute(&self, request: TradeRequest) -> TradeResult {
        tracing::debug!(state = ?TradeState::Received, ?request, "Trade request received.");

        let result = match self.run(&request).await {
            Ok(entry) => TradeResult::Committed(entry),
            Err(Outcome::Rejected(rejection)) => TradeResult::Rejected(rejection),
            Err(Outcome::Failed(err)) => TradeResult::Failed(err),
        };

        match &result {
            TradeResult::Committed(entry) => tracing::info!(
                state = ?TradeState::Committed,
                account_id = entry.account_id,
                entry_id = entry.id,
                symbol = %entry.symbol,
                quantity_delta = entry.quantity_delta,
                unit_price = %entry.unit_price,
                "Trade committed."
            ),
            TradeResult::Rejected(rejection) => tracing::info!(
                state = ?TradeState::Rejected,
                account_id = request.account_id,
                kind = ?rejection.kind(),
                "Trade rejected: {}",
                rejection
            ),
            TradeResult::Failed(err) => tracing::warn!(
                state = ?TradeState::Failed,
                account_id = request.account_id,
                "Trade failed: {}",
                err
            ),
        }
        result
    }

    async fn run(&self, request: &TradeRequest) -> Result<LedgerEntry, Outcome> {
        tracing::debug!(state = ?TradeState::Validating, account_id = request.account_id);

        if request.shares < 1 {
            return Err(Rejection::validation(format!(
                "shares must be a positive integer, got {}",
                request.shares
            ))
            .into());
        }
        let symbol = normalize_symbol(&request.symbol).map_err(Rejection::from)?;

        // No commit attempt is made without a price.
        let quote = self
            .oracle
            .quote(&symbol)
            .await
            .map_err(|err| Rejection::quote_unavailable(&symbol, &err))?;

        let max_attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let portfolio = self.portfolio(request.account_id).await?;
            let draft = check_and_draft(request, &symbol, &quote, &portfolio)?;

            tracing::debug!(
                state = ?TradeState::Committing,
                account_id = request.account_id,
                attempt,
                expected_cash = %portfolio.cash
            );
            match self.store.append(&draft, portfolio.cash).await {
                Ok(entry) => return Ok(entry),
                Err(LedgerError::Conflict { reason, .. }) => {
                    tracing::debug!(
                        state = ?TradeState::Retrying,
                        account_id = request.account_id,
                        attempt,
                        %reason,
                        "Commit lost a race; re-validating."
                    );
                }
                Err(err) => return Err(Outcome::Failed(err.into())),
            }
        }

        Err(Outcome::Failed(ExecutorError::ConflictRetriesExhausted {
            account_id: request.account_id,
            attempts: max_attempts,
        }))
    }

    async fn portfolio(&self, account_id: AccountId) -> Result<Portfolio, Outcome> {
        match self.aggregator.snapshot(account_id).await {
            Ok(portfolio) => Ok(portfolio),
            Err(ExecutorError::Persistence(LedgerError::AccountNotFound(id))) => {
                Err(Rejection::validation(format!("account {} does not exist", id)).into())
            }
            Err(err) => Err(Outcome::Failed(err)),
        }
    }
}

/// Applies the business rules to one portfolio view and builds the entry to commit.
fn check_and_draft(
    request: &TradeRequest,
    symbol: &str,
    quote: &Quote,
    portfolio: &Portfolio,
) -> Result<EntryDraft, Rejection> {
    match request.side {
        TradeSide::Buy => {
            let required = Decimal::from(request.shares)
                .checked_mul(quote.price)
                .ok_or_else(|| {
                    Rejection::validation(format!(
                        "{} shares at {} is too large to price",
                        request.shares, quote.price
                    ))
                })?;
            if required > portfolio.cash {
                return Err(Rejection::InsufficientFunds {
                    symbol: symbol.to_string(),
                    shares: request.shares,
                    required,
                    available: portfolio.cash,
                });
            }
        }
        TradeSide::Sell => {
            let available = portfolio.shares(symbol);
            if available < request.shares {
                return Err(Rejection::InsufficientShares {
                    symbol: symbol.to_string(),
                    requested: request.shares,
                    available,
                });
            }
        }
    }

    let draft = EntryDraft::new(
        request.account_id,
        symbol,
        request.side,
        request.shares,
        quote.price,
    )?;
    if portfolio.cash.checked_add(draft.cash_delta).is_none() {
        return Err(Rejection::validation(format!(
            "proceeds of {} would overflow cash {}",
            draft.cash_delta, portfolio.cash
        )));
    }
    Ok(draft)
}

enum Outcome {
    Rejected(Rejection),
    Failed(ExecutorError),
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn quote(price: Decimal) -> Quote {
        Quote::new("AAPL", "Apple Inc.", price).unwrap()
    }

    #[test]
    fn buy_needs_the_full_notional_in_cash() {
        let portfolio = Portfolio::new(dec!(1499.99));
        let err = check_and_draft(&TradeRequest::buy(1, "AAPL", 10), "AAPL", &quote(dec!(150)), &portfolio)
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::InsufficientFunds {
                symbol: "AAPL".to_string(),
                shares: 10,
                required: dec!(1500),
                available: dec!(1499.99),
            }
        );

        let exact = Portfolio::new(dec!(1500));
        let draft = check_and_draft(&TradeRequest::buy(1, "AAPL", 10), "AAPL", &quote(dec!(150)), &exact)
            .unwrap();
        assert_eq!(draft.cash_delta, dec!(-1500));
        assert_eq!(draft.quantity_delta, 10);
    }

    #[test]
    fn sell_needs_enough_shares() {
        let portfolio = Portfolio {
            cash: dec!(0),
            positions: BTreeMap::from([("AAPL".to_string(), 3)]),
        };
        let err = check_and_draft(&TradeRequest::sell(1, "AAPL", 4), "AAPL", &quote(dec!(10)), &portfolio)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientShares);

        let draft = check_and_draft(&TradeRequest::sell(1, "AAPL", 3), "AAPL", &quote(dec!(10)), &portfolio)
            .unwrap();
        assert_eq!(draft.quantity_delta, -3);
        assert_eq!(draft.cash_delta, dec!(30));
    }

    #[test]
    fn unpriceable_notional_is_a_validation_error() {
        let portfolio = Portfolio::new(Decimal::MAX);
        let err = check_and_draft(
            &TradeRequest::buy(1, "AAPL", i64::MAX),
            "AAPL",
            &quote(Decimal::MAX),
            &portfolio,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn proceeds_past_the_largest_balance_are_a_validation_error() {
        let portfolio = Portfolio {
            cash: Decimal::MAX - dec!(1),
            positions: BTreeMap::from([("AAPL".to_string(), 1)]),
        };
        let err = check_and_draft(&TradeRequest::sell(1, "AAPL", 1), "AAPL", &quote(dec!(2)), &portfolio)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
