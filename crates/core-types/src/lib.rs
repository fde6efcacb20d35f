//! # Stockbook Core Types
//!
//! The shared vocabulary of the trading ledger. Every other crate speaks in
//! these types: accounts, immutable ledger entries, the drafts the executor
//! builds before a commit, and the quotes returned by the price oracle.
//!
//! This is a Layer 0 crate. It knows nothing about storage, networking or
//! configuration.

pub mod enums;
pub mod error;
pub mod money;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{TradeSide, TradeState};
pub use error::CoreError;
pub use money::format_usd;
pub use structs::{
    normalize_symbol, Account, AccountId, CashAdjustment, EntryDraft, EntryId, LedgerEntry, Quote,
};
