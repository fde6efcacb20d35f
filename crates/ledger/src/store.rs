use crate::error::LedgerError;
use async_trait::async_trait;
use core_types::{Account, AccountId, CashAdjustment, EntryDraft, EntryId, LedgerEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cash and net share counts of one account, read in a single consistent view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub account_id: AccountId,
    pub cash: Decimal,
    /// Symbols with a non-zero net share count.
    pub positions: BTreeMap<String, i64>,
    /// Id of the newest committed entry, if any.
    pub last_entry_id: Option<EntryId>,
}

impl LedgerSnapshot {
    /// Net shares held in `symbol` (0 if not held).
    pub fn shares(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }
}

/// Everything recorded for one account, read in a single consistent view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub account: Account,
    /// Chronological, oldest first.
    pub entries: Vec<LedgerEntry>,
    pub adjustments: Vec<CashAdjustment>,
}

/// The durable, append-only record of trades.
///
/// Appends are strictly ordered per account and guarded by an optimistic
/// precondition on the account's cash balance. All reads observe a consistent
/// snapshot; no read ever sees half of a commit.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Registers a new account holding `initial_cash`.
    async fn create_account(
        &self,
        username: &str,
        initial_cash: Decimal,
    ) -> Result<Account, LedgerError>;

    async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError>;

    /// Atomically commits `draft` and applies its cash delta.
    ///
    /// Returns `LedgerError::Conflict` without writing anything when the
    /// account's cash is no longer `expected_cash_before`, or when the draft
    /// would leave the cash or the symbol's position negative against the
    /// state actually committed.
    async fn append(
        &self,
        draft: &EntryDraft,
        expected_cash_before: Decimal,
    ) -> Result<LedgerEntry, LedgerError>;

    /// Atomically deposits `delta` (which must be positive) and returns the new balance.
    async fn adjust_cash(&self, account_id: AccountId, delta: Decimal)
    -> Result<Decimal, LedgerError>;

    async fn cash(&self, account_id: AccountId) -> Result<Decimal, LedgerError>;

    async fn positions(&self, account_id: AccountId)
    -> Result<BTreeMap<String, i64>, LedgerError>;

    async fn snapshot(&self, account_id: AccountId) -> Result<LedgerSnapshot, LedgerError>;

    async fn cash_adjustments(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<CashAdjustment>, LedgerError>;

    async fn ledger_view(&self, account_id: AccountId) -> Result<AccountLedger, LedgerError>;

    /// Forward-only page of history: up to `limit` entries with an id greater
    /// than `after`, oldest first. Pass the last id seen to resume.
    async fn history(
        &self,
        account_id: AccountId,
        after: Option<EntryId>,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// The commit-time checks every store runs inside its atomic section.
///
/// `current_cash` and `current_position` must come from the committed state
/// the store is about to write against. Returns the new cash balance.
pub fn verify_append(
    draft: &EntryDraft,
    expected_cash_before: Decimal,
    current_cash: Decimal,
    current_position: i64,
) -> Result<Decimal, LedgerError> {
    let notional = Decimal::from(draft.quantity_delta).checked_mul(draft.unit_price);
    if notional.map(|notional| -notional) != Some(draft.cash_delta) {
        return Err(LedgerError::InvalidAmount(format!(
            "cash delta {} does not match {} shares at {}",
            draft.cash_delta, draft.quantity_delta, draft.unit_price
        )));
    }
    if current_cash != expected_cash_before {
        return Err(LedgerError::Conflict {
            account_id: draft.account_id,
            reason: format!(
                "expected cash {}, found {}",
                expected_cash_before, current_cash
            ),
        });
    }

    let new_cash = current_cash.checked_add(draft.cash_delta).ok_or_else(|| {
        LedgerError::InvalidAmount(format!(
            "cash {} cannot take a further {}",
            current_cash, draft.cash_delta
        ))
    })?;
    if new_cash.is_sign_negative() {
        return Err(LedgerError::Conflict {
            account_id: draft.account_id,
            reason: format!("cash {} cannot cover {}", current_cash, -draft.cash_delta),
        });
    }

    let new_position = current_position.checked_add(draft.quantity_delta);
    match new_position {
        Some(shares) if shares >= 0 => Ok(new_cash),
        _ => Err(LedgerError::Conflict {
            account_id: draft.account_id,
            reason: format!(
                "position in {} is {}, cannot apply {}",
                draft.symbol, current_position, draft.quantity_delta
            ),
        }),
    }
}

/// Checks a deposit against the committed balance and returns the new balance.
///
/// Non-positive amounts and balances that would overflow are `InvalidAmount`.
pub fn verify_deposit(current_cash: Decimal, delta: Decimal) -> Result<Decimal, LedgerError> {
    if delta <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "deposit must be positive, got {}",
            delta
        )));
    }
    current_cash.checked_add(delta).ok_or_else(|| {
        LedgerError::InvalidAmount(format!("cash {} cannot take a further {}", current_cash, delta))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TradeSide;
    use rust_decimal_macros::dec;

    #[test]
    fn matching_cash_yields_new_balance() {
        let draft = EntryDraft::new(1, "AAPL", TradeSide::Buy, 10, dec!(150)).unwrap();
        assert_eq!(
            verify_append(&draft, dec!(10000), dec!(10000), 0).unwrap(),
            dec!(8500)
        );
    }

    #[test]
    fn stale_cash_is_a_conflict() {
        let draft = EntryDraft::new(1, "AAPL", TradeSide::Buy, 10, dec!(150)).unwrap();
        let err = verify_append(&draft, dec!(10000), dec!(9000), 0).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn oversell_against_committed_state_is_a_conflict() {
        let draft = EntryDraft::new(1, "AAPL", TradeSide::Sell, 5, dec!(10)).unwrap();
        let err = verify_append(&draft, dec!(100), dec!(100), 4).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(verify_append(&draft, dec!(100), dec!(100), 5).unwrap(), dec!(150));
    }

    #[test]
    fn overspend_is_a_conflict() {
        let draft = EntryDraft::new(1, "AAPL", TradeSide::Buy, 2, dec!(60)).unwrap();
        assert!(verify_append(&draft, dec!(100), dec!(100), 0).unwrap_err().is_conflict());
    }

    #[test]
    fn proceeds_past_the_largest_balance_are_invalid() {
        let draft = EntryDraft::new(1, "AAPL", TradeSide::Sell, 1, dec!(2)).unwrap();
        let err = verify_append(&draft, Decimal::MAX, Decimal::MAX, 1).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[test]
    fn deposits_must_be_positive() {
        assert!(verify_deposit(dec!(10), dec!(0)).is_err());
        assert!(verify_deposit(dec!(10), dec!(-5)).is_err());
        assert_eq!(verify_deposit(dec!(10), dec!(0.01)).unwrap(), dec!(10.01));
    }

    #[test]
    fn deposits_past_the_largest_balance_are_invalid() {
        assert!(matches!(
            verify_deposit(Decimal::MAX, dec!(1)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }
}
