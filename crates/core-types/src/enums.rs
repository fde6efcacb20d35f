use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The sign applied to a share count on this side: buys add shares, sells remove them.
    pub fn sign(&self) -> i64 {
        match self {
            TradeSide::Buy => 1,
            TradeSide::Sell => -1,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(CoreError::InvalidInput(
                "side".to_string(),
                format!("expected 'buy' or 'sell', got '{}'", other),
            )),
        }
    }
}

/// The lifecycle of a single trade request inside the executor.
///
/// ```text
/// Received -> Validating -> Rejected
///                        -> Committing -> Committed
///                                      -> Retrying -> Committing
///                                      -> Failed
/// ```
///
/// `Rejected`, `Committed` and `Failed` are terminal. Nothing is visible to
/// readers of the ledger before `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Received,
    Validating,
    Rejected,
    Committing,
    Retrying,
    Committed,
    Failed,
}

impl TradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Rejected | TradeState::Committed | TradeState::Failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("BUY".parse::<TradeSide>().unwrap(), TradeSide::Buy);
        assert_eq!(" sell ".parse::<TradeSide>().unwrap(), TradeSide::Sell);
        assert!("short".parse::<TradeSide>().is_err());
    }

    #[test]
    fn sides_carry_opposite_signs() {
        assert_eq!(TradeSide::Buy.sign(), 1);
        assert_eq!(TradeSide::Sell.sign(), -1);
    }

    #[test]
    fn only_end_states_are_terminal() {
        assert!(TradeState::Committed.is_terminal());
        assert!(TradeState::Rejected.is_terminal());
        assert!(TradeState::Failed.is_terminal());
        assert!(!TradeState::Retrying.is_terminal());
        assert!(!TradeState::Committing.is_terminal());
    }
}
