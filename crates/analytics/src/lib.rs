//! # Stockbook Analytics
//!
//! This crate values accounts. It combines the holdings recorded in the ledger
//! with fresh quotes from the price oracle and reports cash, per-position market
//! value and net worth.
//!
//! ## Architectural Principles
//!
//! - **Read-only:** The `ValuationEngine` consumes the ledger through a single
//!   consistent view and never writes. A valuation is ephemeral.
//! - **Partial over nothing:** Quotes are fetched concurrently. A symbol that cannot
//!   be priced is reported as unavailable while the rest of the account is still valued.
//!
//! ## Public API
//!
//! - `ValuationEngine`: Produces a `Valuation` for an account.
//! - `Valuation` / `PositionValue`: The valuation report.
//! - `ValuationError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod report;
pub mod valuation;

pub use error::ValuationError;
pub use report::{PositionQuote, PositionValue, Valuation};
pub use valuation::ValuationEngine;
