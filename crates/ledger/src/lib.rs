//! # Stockbook Ledger
//!
//! The contract of the ledger store: a durable, append-only sequence of
//! immutable trade records keyed by account, with optimistic concurrency on
//! the account's cash balance.
//!
//! ## Public API
//!
//! - `LedgerStore`: the async trait every store implements. The PostgreSQL
//!   implementation lives in the `database` crate.
//! - `InMemoryLedger`: a process-local implementation.
//! - `LedgerSnapshot` / `AccountLedger`: consistent read views.
//! - `verify_append`: the commit-time checks shared by all stores.
//! - `LedgerError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod memory;
pub mod store;

pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use store::{verify_append, verify_deposit, AccountLedger, LedgerSnapshot, LedgerStore};
