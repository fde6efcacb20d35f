use chrono::{DateTime, Utc};
use core_types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The price side of a valued position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PositionQuote {
    Priced {
        name: String,
        price: Decimal,
        market_value: Decimal,
    },
    /// The oracle could not price the symbol; the position is left out of `net_worth`.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub symbol: String,
    pub shares: i64,
    pub quote: PositionQuote,
}

impl PositionValue {
    pub fn market_value(&self) -> Option<Decimal> {
        match &self.quote {
            PositionQuote::Priced { market_value, .. } => Some(*market_value),
            PositionQuote::Unavailable { .. } => None,
        }
    }

    pub fn is_priced(&self) -> bool {
        self.market_value().is_some()
    }
}

/// A point-in-time valuation of one account.
///
/// This struct is the output of the `ValuationEngine`. It is ephemeral and is
/// never written back to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub account_id: AccountId,
    pub cash: Decimal,
    /// One row per held symbol, in symbol order.
    pub positions: Vec<PositionValue>,
    /// Sum of the market values of the positions that priced.
    pub holdings_value: Decimal,
    /// `cash + holdings_value`.
    pub net_worth: Decimal,
    /// Initial cash plus every deposit.
    pub contributions: Decimal,
    pub as_of: DateTime<Utc>,
}

impl Valuation {
    /// True when at least one position could not be priced.
    pub fn is_partial(&self) -> bool {
        self.positions.iter().any(|position| !position.is_priced())
    }

    pub fn unavailable_symbols(&self) -> Vec<&str> {
        self.positions
            .iter()
            .filter(|position| !position.is_priced())
            .map(|position| position.symbol.as_str())
            .collect()
    }

    /// Net worth less contributions. `None` when the valuation is partial.
    pub fn profit_loss(&self) -> Option<Decimal> {
        if self.is_partial() {
            None
        } else {
            Some(self.net_worth - self.contributions)
        }
    }
}
