use crate::error::EngineError;
use analytics::{Valuation, ValuationEngine};
use api_client::PriceOracle;
use configuration::{Config, ExecutorSettings};
use core_types::{normalize_symbol, Account, AccountId, EntryId, LedgerEntry, Quote, TradeSide};
use executor::{TradeExecutor, TradeRequest, TradeResult};
use futures::stream::{BoxStream, TryStreamExt};
use ledger::LedgerStore;
use rust_decimal::Decimal;
use std::sync::Arc;

pub mod error;
mod history;

/// Page size used when a caller asks for the whole history at once.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// The single entry point the outer surfaces (CLI, tests) talk to.
///
/// It wires one ledger store and one price oracle into the trade executor and
/// the valuation engine and adds the account-level operations around them.
#[derive(Clone)]
pub struct Brokerage {
    // --- Shared, Thread-Safe Components ---
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    executor: TradeExecutor,
    valuation: ValuationEngine,

    // --- Configuration ---
    default_initial_cash: Decimal,
}

impl Brokerage {
    /// Creates a `Brokerage` that grants the configured default cash to new accounts.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        settings: ExecutorSettings,
    ) -> Self {
        let default_initial_cash = configuration::AccountSettings::default().default_initial_cash;
        Self {
            executor: TradeExecutor::new(store.clone(), oracle.clone(), settings),
            valuation: ValuationEngine::new(store.clone(), oracle.clone()),
            store,
            oracle,
            default_initial_cash,
        }
    }

    pub fn from_config(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        config: &Config,
    ) -> Self {
        Self::new(store, oracle, config.executor.clone())
            .with_default_initial_cash(config.accounts.default_initial_cash)
    }

    pub fn with_default_initial_cash(mut self, cash: Decimal) -> Self {
        self.default_initial_cash = cash;
        self
    }

    /// Opens an account. `initial_cash` falls back to the configured default.
    pub async fn register(
        &self,
        username: &str,
        initial_cash: Option<Decimal>,
    ) -> Result<Account, EngineError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(EngineError::Validation("username must not be empty".to_string()));
        }
        let initial_cash = initial_cash.unwrap_or(self.default_initial_cash);
        if initial_cash.is_sign_negative() {
            return Err(EngineError::Validation(format!(
                "initial cash must not be negative, got {}",
                initial_cash
            )));
        }

        let account = self.store.create_account(username, initial_cash).await?;
        tracing::info!(account_id = account.id, %username, cash = %account.cash, "Account registered.");
        Ok(account)
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account, EngineError> {
        Ok(self.store.account(account_id).await?)
    }

    /// Runs a buy or sell to completion. Rejections and failures are part of
    /// the `TradeResult`, never an `Err`.
    pub async fn submit_trade(
        &self,
        account_id: AccountId,
        side: TradeSide,
        symbol: &str,
        shares: i64,
    ) -> TradeResult {
        self.executor
            .execute(TradeRequest {
                account_id,
                side,
                symbol: symbol.to_string(),
                shares,
            })
            .await
    }

    pub async fn get_valuation(&self, account_id: AccountId) -> Result<Valuation, EngineError> {
        Ok(self.valuation.valuation(account_id).await?)
    }

    /// Every entry of the account, oldest first.
    pub async fn get_history(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, EngineError> {
        // Surface unknown accounts even when the history would be empty.
        self.store.account(account_id).await?;
        self.history_stream(account_id, HISTORY_PAGE_SIZE)
            .try_collect()
            .await
    }

    /// The account's entries as a stream, fetched `page_size` at a time.
    pub fn history_stream(
        &self,
        account_id: AccountId,
        page_size: usize,
    ) -> BoxStream<'static, Result<LedgerEntry, EngineError>> {
        self.history_stream_after(account_id, None, page_size)
    }

    /// Resumes a history stream after the entry with id `after`.
    pub fn history_stream_after(
        &self,
        account_id: AccountId,
        after: Option<EntryId>,
        page_size: usize,
    ) -> BoxStream<'static, Result<LedgerEntry, EngineError>> {
        history::entry_stream(self.store.clone(), account_id, after, page_size)
    }

    /// Looks up a quote without trading.
    pub async fn quote(&self, symbol: &str) -> Result<Quote, EngineError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.oracle.quote(&symbol).await?)
    }

    /// Deposits `delta` into the account and returns the new balance.
    pub async fn adjust_cash(
        &self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Decimal, EngineError> {
        if delta <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "deposit must be positive, got {}",
                delta
            )));
        }
        let cash = self.store.adjust_cash(account_id, delta).await?;
        tracing::info!(account_id, %delta, %cash, "Cash deposited.");
        Ok(cash)
    }
}
