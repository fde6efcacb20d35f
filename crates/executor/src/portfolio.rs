use crate::error::ExecutorError;
use async_trait::async_trait;
use core_types::{AccountId, LedgerEntry};
use ledger::{AccountLedger, LedgerSnapshot, LedgerStore};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The cash and holdings of one account, derived from its ledger.
/// Its sole responsibility is to reflect state; it never validates trades or writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub cash: Decimal,
    /// Net shares per symbol. Symbols netting to zero are removed.
    pub positions: BTreeMap<String, i64>,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting cash and no holdings.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            cash: snapshot.cash,
            positions: snapshot.positions,
        }
    }

    /// Rebuilds the portfolio by replaying every entry and deposit of an account.
    ///
    /// Fails if a prefix of the log would hold a negative position, or if the
    /// replayed cash disagrees with the balance the store reports.
    pub fn from_ledger(ledger: &AccountLedger) -> Result<Self, ExecutorError> {
        let mut portfolio = Self::new(ledger.account.initial_cash);
        for entry in &ledger.entries {
            portfolio.apply(entry)?;
        }
        for adjustment in &ledger.adjustments {
            portfolio.cash = portfolio.cash.checked_add(adjustment.amount).ok_or_else(|| {
                ExecutorError::PortfolioError(format!(
                    "deposit {} overflows cash {}",
                    adjustment.id, portfolio.cash
                ))
            })?;
        }

        if portfolio.cash != ledger.account.cash {
            return Err(ExecutorError::PortfolioError(format!(
                "account {} replays to cash {} but the store holds {}",
                ledger.account.id, portfolio.cash, ledger.account.cash
            )));
        }
        Ok(portfolio)
    }

    /// Applies one committed entry. This is the core state transition; it does not price anything.
    pub fn apply(&mut self, entry: &LedgerEntry) -> Result<(), ExecutorError> {
        let held = self.shares(&entry.symbol);
        let shares = held.checked_add(entry.quantity_delta).ok_or_else(|| {
            ExecutorError::PortfolioError(format!("position in {} overflows", entry.symbol))
        })?;
        if shares < 0 {
            return Err(ExecutorError::PortfolioError(format!(
                "entry {} takes {} from {} to {} shares",
                entry.id, entry.symbol, held, shares
            )));
        }

        self.cash = self.cash.checked_add(entry.cash_delta).ok_or_else(|| {
            ExecutorError::PortfolioError(format!("entry {} overflows cash {}", entry.id, self.cash))
        })?;
        if shares == 0 {
            self.positions.remove(&entry.symbol);
        } else {
            self.positions.insert(entry.symbol.clone(), shares);
        }
        Ok(())
    }

    /// Net shares held in `symbol` (0 if not held).
    pub fn shares(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }
}

/// Produces the current `Portfolio` of an account.
///
/// Implementations must agree with the store's latest committed state at the
/// time of the call.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn snapshot(&self, account_id: AccountId) -> Result<Portfolio, ExecutorError>;
}

/// Reads the store's own consistent snapshot. The default strategy.
#[derive(Clone)]
pub struct StoreAggregator {
    store: Arc<dyn LedgerStore>,
}

impl StoreAggregator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Aggregator for StoreAggregator {
    async fn snapshot(&self, account_id: AccountId) -> Result<Portfolio, ExecutorError> {
        Ok(Portfolio::from_snapshot(self.store.snapshot(account_id).await?))
    }
}

/// Recomputes the portfolio from the full ledger on every call.
#[derive(Clone)]
pub struct ScanAggregator {
    store: Arc<dyn LedgerStore>,
}

impl ScanAggregator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Aggregator for ScanAggregator {
    async fn snapshot(&self, account_id: AccountId) -> Result<Portfolio, ExecutorError> {
        let ledger = self.store.ledger_view(account_id).await?;
        Portfolio::from_ledger(&ledger)
    }
}
