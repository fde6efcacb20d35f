//! Runs against a real PostgreSQL database and is skipped by default.
//!
//! `DATABASE_URL=postgres://... cargo test -p database -- --ignored`
//!
//! The database must be disposable: migrations are applied and accounts are
//! created under unique names on every run.

use chrono::Utc;
use configuration::DatabaseSettings;
use core_types::{Account, EntryDraft, TradeSide};
use database::connection::{connect, run_migrations};
use database::repository::DbRepository;
use ledger::{LedgerError, LedgerStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

async fn repository() -> DbRepository {
    let settings = DatabaseSettings {
        url: std::env::var("DATABASE_URL").ok(),
        ..DatabaseSettings::default()
    };
    let pool = connect(&settings)
        .await
        .expect("DATABASE_URL must point at a disposable PostgreSQL database");
    run_migrations(&pool).await.unwrap();
    DbRepository::new(pool)
}

async fn account(repo: &DbRepository, name: &str, cash: Decimal) -> Account {
    let username = format!("{}-{}", name, Utc::now().timestamp_nanos_opt().unwrap_or_default());
    repo.create_account(&username, cash).await.unwrap()
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn racing_appends_on_the_same_balance_commit_once() {
    let repo = repository().await;
    let account = account(&repo, "grace", dec!(1500)).await;
    let buy = EntryDraft::new(account.id, "AAPL", TradeSide::Buy, 5, dec!(150)).unwrap();
    repo.append(&buy, dec!(1500)).await.unwrap();

    let sell = EntryDraft::new(account.id, "AAPL", TradeSide::Sell, 5, dec!(150)).unwrap();
    let (first, second) = tokio::join!(repo.append(&sell, dec!(750)), repo.append(&sell, dec!(750)));

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(LedgerError::is_conflict));

    let snapshot = repo.snapshot(account.id).await.unwrap();
    assert_eq!(snapshot.cash, dec!(1500));
    assert_eq!(snapshot.shares("AAPL"), 0);
    assert_eq!(repo.history(account.id, None, 10).await.unwrap().len(), 2);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn matching_cash_does_not_hide_a_sold_position() {
    let repo = repository().await;
    let account = account(&repo, "heidi", dec!(1000)).await;
    let buy = EntryDraft::new(account.id, "MSFT", TradeSide::Buy, 2, dec!(100)).unwrap();
    repo.append(&buy, dec!(1000)).await.unwrap();
    let sell = EntryDraft::new(account.id, "MSFT", TradeSide::Sell, 2, dec!(100)).unwrap();
    repo.append(&sell, dec!(800)).await.unwrap();

    // Cash is back at 1000 but the shares are gone.
    let stale = EntryDraft::new(account.id, "MSFT", TradeSide::Sell, 2, dec!(100)).unwrap();
    let err = repo.append(&stale, dec!(1000)).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(repo.cash(account.id).await.unwrap(), dec!(1000));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn deposits_past_the_largest_balance_are_refused() {
    let repo = repository().await;
    let account = account(&repo, "ivan", Decimal::MAX).await;

    assert!(matches!(
        repo.adjust_cash(account.id, dec!(1)).await,
        Err(LedgerError::InvalidAmount(_))
    ));
    assert_eq!(repo.cash(account.id).await.unwrap(), Decimal::MAX);
    assert!(repo.cash_adjustments(account.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn unknown_accounts_are_reported() {
    let repo = repository().await;
    let draft = EntryDraft::new(i64::MAX, "AAPL", TradeSide::Buy, 1, dec!(1)).unwrap();
    assert_eq!(
        repo.append(&draft, dec!(1)).await.unwrap_err(),
        LedgerError::AccountNotFound(i64::MAX)
    );
}
