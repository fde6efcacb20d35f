//! # Stockbook Executor Crate
//!
//! This crate turns trade requests into committed ledger entries. It provides the
//! `TradeExecutor`, which validates a request against a consistent portfolio view
//! and commits it through the ledger's optimistic compare-and-append, and the
//! `Portfolio` derived state together with the `Aggregator` strategies that build it.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** `Portfolio` only reflects what the ledger holds.
//!   The executor decides whether a trade is allowed and the store decides whether
//!   the commit still applies. Neither mutates the other's state.
//! - **Retry, not lock:** No lock is held across the oracle call or across the
//!   validation step. A lost race surfaces as a store conflict that writes nothing,
//!   and the executor re-validates against fresh state within a bounded budget.
//!
//! ## Public API
//!
//! - `TradeExecutor`: Runs a `TradeRequest` to a terminal `TradeResult`.
//! - `Portfolio`: Cash and net holdings of one account.
//! - `Aggregator`: Strategy for producing a `Portfolio` (`StoreAggregator`, `ScanAggregator`).
//! - `Rejection` / `ExecutorError`: The refusal and failure types of this crate.

pub mod error;
pub mod portfolio;
pub mod trade;

pub use error::{ErrorKind, ExecutorError, Rejection};
pub use portfolio::{Aggregator, Portfolio, ScanAggregator, StoreAggregator};
pub use trade::{TradeExecutor, TradeRequest, TradeResult};
