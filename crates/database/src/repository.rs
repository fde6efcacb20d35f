use crate::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, AccountId, CashAdjustment, EntryDraft, EntryId, LedgerEntry};
use ledger::{verify_append, verify_deposit, AccountLedger, LedgerError, LedgerSnapshot, LedgerStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, Transaction};
use std::collections::BTreeMap;

/// The `DbRepository` is the PostgreSQL-backed `LedgerStore`. It encapsulates
/// all SQL queries and the mapping between table rows and core types.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Represents a row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAccount {
    pub id: i64,
    pub username: String,
    pub cash: Decimal,
    pub initial_cash: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<DbAccount> for Account {
    fn from(row: DbAccount) -> Self {
        Account {
            id: row.id,
            username: row.username,
            cash: row.cash,
            initial_cash: row.initial_cash,
            created_at: row.created_at,
        }
    }
}

/// Represents a row from the `ledger_entries` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub symbol: String,
    pub quantity_delta: i64,
    pub unit_price: Decimal,
    pub cash_delta: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl From<DbLedgerEntry> for LedgerEntry {
    fn from(row: DbLedgerEntry) -> Self {
        LedgerEntry {
            id: row.id,
            account_id: row.account_id,
            symbol: row.symbol,
            quantity_delta: row.quantity_delta,
            unit_price: row.unit_price,
            cash_delta: row.cash_delta,
            executed_at: row.executed_at,
        }
    }
}

/// Represents a row from the `cash_adjustments` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCashAdjustment {
    pub id: i64,
    pub account_id: i64,
    pub amount: Decimal,
    pub adjusted_at: DateTime<Utc>,
}

impl From<DbCashAdjustment> for CashAdjustment {
    fn from(row: DbCashAdjustment) -> Self {
        CashAdjustment {
            id: row.id,
            account_id: row.account_id,
            amount: row.amount,
            adjusted_at: row.adjusted_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, cash, initial_cash, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, symbol, quantity_delta, unit_price, cash_delta, executed_at";

/// Maps a driver error into the store's error type.
fn persistence(err: sqlx::Error) -> LedgerError {
    DbError::from(err).into()
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a read-only transaction whose statements all see the same snapshot.
    async fn read_snapshot(&self) -> Result<Transaction<'static, Postgres>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        Ok(tx)
    }

    async fn fetch_account(
        tx: &mut Transaction<'static, Postgres>,
        account_id: AccountId,
    ) -> Result<DbAccount, LedgerError> {
        sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(persistence)?
        .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn fetch_positions(
        tx: &mut Transaction<'static, Postgres>,
        account_id: AccountId,
    ) -> Result<BTreeMap<String, i64>, LedgerError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT symbol, SUM(quantity_delta)::BIGINT AS shares
            FROM ledger_entries
            WHERE account_id = $1
            GROUP BY symbol
            HAVING SUM(quantity_delta) <> 0
            ORDER BY symbol
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(persistence)?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl LedgerStore for DbRepository {
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

        let row = sqlx::query_as::<_, DbAccount>(&format!(
            "INSERT INTO accounts (username, cash, initial_cash) VALUES ($1, $2, $2) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(username)
        .bind(initial_cash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let taken = matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation());
            if taken {
                LedgerError::DuplicateUsername(username.to_string())
            } else {
                persistence(e)
            }
        })?;

        tracing::info!(account_id = row.id, %username, "Account created.");
        Ok(row.into())
    }

    async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let row = sqlx::query_as::<_, DbAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?
        .ok_or(LedgerError::AccountNotFound(account_id))?;
        Ok(row.into())
    }

    /// Commits one entry in a single transaction.
    ///
    /// The account row is locked with `FOR UPDATE`, so concurrent appends for
    /// the same account queue behind each other while the precondition and the
    /// position are re-checked against committed data. Returning early drops
    /// the transaction, which rolls it back.
    async fn append(
        &self,
        draft: &EntryDraft,
        expected_cash_before: Decimal,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let current_cash: Decimal =
            sqlx::query_scalar("SELECT cash FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(draft.account_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(persistence)?
                .ok_or(LedgerError::AccountNotFound(draft.account_id))?;

        let current_position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_delta), 0)::BIGINT FROM ledger_entries WHERE account_id = $1 AND symbol = $2",
        )
        .bind(draft.account_id)
        .bind(&draft.symbol)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence)?;

        let new_cash = verify_append(draft, expected_cash_before, current_cash, current_position)?;

        sqlx::query("UPDATE accounts SET cash = $1 WHERE id = $2")
            .bind(new_cash)
            .bind(draft.account_id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        let row = sqlx::query_as::<_, DbLedgerEntry>(&format!(
            r#"
            INSERT INTO ledger_entries (account_id, symbol, quantity_delta, unit_price, cash_delta)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(draft.account_id)
        .bind(&draft.symbol)
        .bind(draft.quantity_delta)
        .bind(draft.unit_price)
        .bind(draft.cash_delta)
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        Ok(row.into())
    }

    async fn adjust_cash(
        &self,
        account_id: AccountId,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let current_cash: Decimal =
            sqlx::query_scalar("SELECT cash FROM accounts WHERE id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(persistence)?
                .ok_or(LedgerError::AccountNotFound(account_id))?;
        let new_cash = verify_deposit(current_cash, delta)?;

        sqlx::query("UPDATE accounts SET cash = $1 WHERE id = $2")
            .bind(new_cash)
            .bind(account_id)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        sqlx::query("INSERT INTO cash_adjustments (account_id, amount) VALUES ($1, $2)")
            .bind(account_id)
            .bind(delta)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        Ok(new_cash)
    }

    async fn cash(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        sqlx::query_scalar("SELECT cash FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn positions(
        &self,
        account_id: AccountId,
    ) -> Result<BTreeMap<String, i64>, LedgerError> {
        Ok(self.snapshot(account_id).await?.positions)
    }

    async fn snapshot(&self, account_id: AccountId) -> Result<LedgerSnapshot, LedgerError> {
        let mut tx = self.read_snapshot().await?;

        let account = Self::fetch_account(&mut tx, account_id).await?;
        let positions = Self::fetch_positions(&mut tx, account_id).await?;
        let last_entry_id: Option<i64> =
            sqlx::query_scalar("SELECT MAX(id) FROM ledger_entries WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        Ok(LedgerSnapshot {
            account_id,
            cash: account.cash,
            positions,
            last_entry_id,
        })
    }

    async fn cash_adjustments(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CashAdjustment>, LedgerError> {
        Ok(self.ledger_view(account_id).await?.adjustments)
    }

    async fn ledger_view(&self, account_id: AccountId) -> Result<AccountLedger, LedgerError> {
        let mut tx = self.read_snapshot().await?;

        let account = Self::fetch_account(&mut tx, account_id).await?;
        let entries = sqlx::query_as::<_, DbLedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE account_id = $1 ORDER BY id ASC"
        ))
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(persistence)?;
        let adjustments = sqlx::query_as::<_, DbCashAdjustment>(
            "SELECT id, account_id, amount, adjusted_at FROM cash_adjustments WHERE account_id = $1 ORDER BY id ASC",
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        Ok(AccountLedger {
            account: account.into(),
            entries: entries.into_iter().map(Into::into).collect(),
            adjustments: adjustments.into_iter().map(Into::into).collect(),
        })
    }

    async fn history(
        &self,
        account_id: AccountId,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let limit = i64::try_from(limit).map_err(|_| {
            LedgerError::from(DbError::MappingError(format!("page size {} is too large", limit)))
        })?;

        let mut tx = self.read_snapshot().await?;
        Self::fetch_account(&mut tx, account_id).await?;
        let rows = sqlx::query_as::<_, DbLedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE account_id = $1 AND id > $2 ORDER BY id ASC LIMIT $3"
        ))
        .bind(account_id)
        .bind(after.unwrap_or(0))
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .map_err(persistence)?;

        tx.commit().await.map_err(persistence)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
