use crate::enums::TradeSide;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AccountId = i64;
pub type EntryId = i64;

/// Normalizes a ticker symbol: surrounding whitespace is trimmed and letters are uppercased.
///
/// Empty symbols and symbols containing whitespace or control characters are rejected.
pub fn normalize_symbol(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "symbol".to_string(),
            "symbol must not be empty".to_string(),
        ));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::InvalidInput(
            "symbol".to_string(),
            format!("'{}' contains whitespace or control characters", trimmed),
        ));
    }
    Ok(trimmed.to_uppercase())
}

/// A trading account as owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Current cash balance. Never negative.
    pub cash: Decimal,
    /// The balance the account was registered with.
    pub initial_cash: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An uncommitted ledger entry, built by the trade executor and handed to the store.
///
/// The deltas are derived once from the signed share count:
/// `quantity_delta = sign(side) * shares` and `cash_delta = -quantity_delta * unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub account_id: AccountId,
    pub symbol: String,
    pub quantity_delta: i64,
    pub unit_price: Decimal,
    pub cash_delta: Decimal,
}

impl EntryDraft {
    pub fn new(
        account_id: AccountId,
        symbol: &str,
        side: TradeSide,
        shares: i64,
        unit_price: Decimal,
    ) -> Result<Self, CoreError> {
        if shares < 1 {
            return Err(CoreError::InvalidInput(
                "shares".to_string(),
                format!("must be a positive integer, got {}", shares),
            ));
        }
        if unit_price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "unit_price".to_string(),
                format!("must be positive, got {}", unit_price),
            ));
        }

        let quantity_delta = side.sign() * shares;
        let cash_delta = Decimal::from(quantity_delta)
            .checked_mul(unit_price)
            .map(|notional| -notional)
            .ok_or_else(|| {
                CoreError::Calculation(format!(
                    "{} shares at {} overflows the cash amount",
                    shares, unit_price
                ))
            })?;

        Ok(Self {
            account_id,
            symbol: normalize_symbol(symbol)?,
            quantity_delta,
            unit_price,
            cash_delta,
        })
    }

    pub fn side(&self) -> TradeSide {
        side_of(self.quantity_delta)
    }
}

/// One immutable, committed record of a single buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic sequence number, assigned at commit.
    pub id: EntryId,
    pub account_id: AccountId,
    pub symbol: String,
    /// Positive when shares were acquired, negative when relinquished.
    pub quantity_delta: i64,
    pub unit_price: Decimal,
    /// Negative when cash decreased, positive when it increased.
    pub cash_delta: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn side(&self) -> TradeSide {
        side_of(self.quantity_delta)
    }

    /// Absolute number of shares moved by this entry.
    pub fn shares(&self) -> i64 {
        self.quantity_delta.abs()
    }
}

fn side_of(quantity_delta: i64) -> TradeSide {
    if quantity_delta >= 0 {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    }
}

/// A committed deposit into an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashAdjustment {
    pub id: i64,
    pub account_id: AccountId,
    /// Always positive.
    pub amount: Decimal,
    pub adjusted_at: DateTime<Utc>,
}

/// A price/name pair for a symbol, as returned by the price oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
}

impl Quote {
    pub fn new(symbol: &str, name: impl Into<String>, price: Decimal) -> Result<Self, CoreError> {
        if price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "price".to_string(),
                format!("quote for {} must be positive, got {}", symbol, price),
            ));
        }
        Ok(Self {
            symbol: normalize_symbol(symbol)?,
            name: name.into(),
            price,
        })
    }
}
