use crate::error::LedgerError;
use crate::store::{verify_append, verify_deposit, AccountLedger, LedgerSnapshot, LedgerStore};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{Account, AccountId, CashAdjustment, EntryDraft, EntryId, LedgerEntry};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// All state recorded for one account.
#[derive(Debug, Clone)]
struct AccountBook {
    account: Account,
    entries: Vec<LedgerEntry>,
    adjustments: Vec<CashAdjustment>,
    /// Running net shares per symbol, kept in step with `entries`.
    positions: BTreeMap<String, i64>,
}

impl AccountBook {
    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            account_id: self.account.id,
            cash: self.account.cash,
            positions: self
                .positions
                .iter()
                .filter(|(_, shares)| **shares != 0)
                .map(|(symbol, shares)| (symbol.clone(), *shares))
                .collect(),
            last_entry_id: self.entries.last().map(|entry| entry.id),
        }
    }
}

#[derive(Debug, Default)]
struct Books {
    accounts: HashMap<AccountId, AccountBook>,
    usernames: HashMap<String, AccountId>,
    next_account_id: AccountId,
    next_entry_id: EntryId,
    next_adjustment_id: i64,
}

impl Books {
    fn book(&self, account_id: AccountId) -> Result<&AccountBook, LedgerError> {
        self.accounts
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    fn book_mut(&mut self, account_id: AccountId) -> Result<&mut AccountBook, LedgerError> {
        self.accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

/// A process-local `LedgerStore`.
///
/// Every commit takes the write lock for the compare-and-append only, so a
/// commit is all-or-nothing from the point of view of any reader. Used by the
/// test suite and for offline runs; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    books: RwLock<Books>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_account(
        &self,
        username: &str,
        initial_cash: Decimal,
    ) -> Result<Account, LedgerError> {
        if initial_cash.is_sign_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "initial cash must not be negative, got {}",
                initial_cash
            )));
        }

        let mut books = self.books.write().await;
        if books.usernames.contains_key(username) {
            return Err(LedgerError::DuplicateUsername(username.to_string()));
        }

        books.next_account_id += 1;
        let account = Account {
            id: books.next_account_id,
            username: username.to_string(),
            cash: initial_cash,
            initial_cash,
            created_at: Utc::now(),
        };
        books.usernames.insert(username.to_string(), account.id);
        books.accounts.insert(
            account.id,
            AccountBook {
                account: account.clone(),
                entries: Vec::new(),
                adjustments: Vec::new(),
                positions: BTreeMap::new(),
            },
        );

        tracing::debug!(account_id = account.id, %username, "Account created.");
        Ok(account)
    }

    async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let books = self.books.read().await;
        Ok(books.book(account_id)?.account.clone())
    }

    async fn append(
        &self,
        draft: &EntryDraft,
        expected_cash_before: Decimal,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut books = self.books.write().await;

        let new_cash = {
            let book = books.book(draft.account_id)?;
            let position = book.positions.get(&draft.symbol).copied().unwrap_or(0);
            verify_append(draft, expected_cash_before, book.account.cash, position)?
        };

        books.next_entry_id += 1;
        let entry = LedgerEntry {
            id: books.next_entry_id,
            account_id: draft.account_id,
            symbol: draft.symbol.clone(),
            quantity_delta: draft.quantity_delta,
            unit_price: draft.unit_price,
            cash_delta: draft.cash_delta,
            executed_at: Utc::now(),
        };

        let book = books.book_mut(draft.account_id)?;
        book.account.cash = new_cash;
        *book.positions.entry(entry.symbol.clone()).or_insert(0) += entry.quantity_delta;
        book.entries.push(entry.clone());

        Ok(entry)
    }

    async fn adjust_cash(
        &self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let mut books = self.books.write().await;
        // Check the deposit before consuming an id.
        let new_cash = verify_deposit(books.book(account_id)?.account.cash, delta)?;
        books.next_adjustment_id += 1;
        let adjustment = CashAdjustment {
            id: books.next_adjustment_id,
            account_id,
            amount: delta,
            adjusted_at: Utc::now(),
        };

        let book = books.book_mut(account_id)?;
        book.account.cash = new_cash;
        book.adjustments.push(adjustment);
        Ok(book.account.cash)
    }

    async fn cash(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        let books = self.books.read().await;
        Ok(books.book(account_id)?.account.cash)
    }

    async fn positions(
        &self,
        account_id: AccountId,
    ) -> Result<BTreeMap<String, i64>, LedgerError> {
        let books = self.books.read().await;
        Ok(books.book(account_id)?.snapshot().positions)
    }

    async fn snapshot(&self, account_id: AccountId) -> Result<LedgerSnapshot, LedgerError> {
        let books = self.books.read().await;
        Ok(books.book(account_id)?.snapshot())
    }

    async fn cash_adjustments(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CashAdjustment>, LedgerError> {
        let books = self.books.read().await;
        Ok(books.book(account_id)?.adjustments.clone())
    }

    async fn ledger_view(&self, account_id: AccountId) -> Result<AccountLedger, LedgerError> {
        let books = self.books.read().await;
        let book = books.book(account_id)?;
        Ok(AccountLedger {
            account: book.account.clone(),
            entries: book.entries.clone(),
            adjustments: book.adjustments.clone(),
        })
    }

    async fn history(
        &self,
        account_id: AccountId,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let books = self.books.read().await;
        let book = books.book(account_id)?;
        // Entries are pushed in id order, so the cursor can be found by binary search.
        let start = match after {
            Some(after) => book.entries.partition_point(|entry| entry.id <= after),
            None => 0,
        };
        Ok(book.entries.iter().skip(start).take(limit).cloned().collect())
    }
}
