//! # Stockbook Database Crate
//!
//! This crate is the PostgreSQL implementation of the ledger store. It is the
//! system's permanent record of accounts, trades and deposits.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. The rest of the application talks to the
//!   `LedgerStore` trait and never sees a row or a query.
//! - **Typed rows:** Every table has a `FromRow` struct that is converted into
//!   the matching core type at the boundary; no column is read by string key in
//!   the domain logic.
//! - **Atomic commits:** An append locks the account row, re-checks the
//!   optimistic precondition against committed data, and writes the balance
//!   and the entry in one transaction.
//!
//! ## Public API
//!
//! - `connect`: Establishes the connection pool.
//! - `run_migrations`: Applies the embedded schema migrations.
//! - `DbRepository`: The `LedgerStore` implementation.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::{DbAccount, DbCashAdjustment, DbLedgerEntry, DbRepository};
