use api_client::StaticPriceOracle;
use configuration::{parse_config, ExecutorSettings};
use core_types::{Quote, TradeSide};
use engine::error::EngineError;
use engine::Brokerage;
use executor::ErrorKind;
use futures::{StreamExt, TryStreamExt};
use ledger::{InMemoryLedger, LedgerError};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn brokerage() -> (Brokerage, Arc<StaticPriceOracle>) {
    let oracle = Arc::new(
        StaticPriceOracle::new()
            .with_quote(Quote::new("AAPL", "Apple Inc.", dec!(150)).unwrap())
            .with_quote(Quote::new("NFLX", "Netflix Inc.", dec!(10)).unwrap()),
    );
    let brokerage = Brokerage::new(
        Arc::new(InMemoryLedger::new()),
        oracle.clone(),
        ExecutorSettings::default(),
    );
    (brokerage, oracle)
}

#[tokio::test]
async fn registration_grants_the_default_cash() {
    let (brokerage, _) = brokerage();

    let alice = brokerage.register("  alice ", None).await.unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.cash, dec!(10000.00));
    assert_eq!(alice.initial_cash, dec!(10000.00));

    let bob = brokerage.register("bob", Some(dec!(5000))).await.unwrap();
    assert_eq!(bob.cash, dec!(5000));
}

#[tokio::test]
async fn registration_validates_its_input() {
    let (brokerage, _) = brokerage();
    brokerage.register("alice", None).await.unwrap();

    assert_eq!(
        brokerage.register("alice", None).await.unwrap_err(),
        EngineError::Ledger(LedgerError::DuplicateUsername("alice".to_string()))
    );
    assert!(matches!(
        brokerage.register("   ", None).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        brokerage.register("carol", Some(dec!(-1))).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn configured_default_cash_is_used() {
    let config = parse_config("[accounts]\ndefault_initial_cash = 2500\n").unwrap();
    let brokerage = Brokerage::from_config(
        Arc::new(InMemoryLedger::new()),
        Arc::new(StaticPriceOracle::new()),
        &config,
    );
    let account = brokerage.register("dave", None).await.unwrap();
    assert_eq!(account.cash, dec!(2500));
}

#[tokio::test]
async fn trades_show_up_in_valuation_and_history() {
    let (brokerage, oracle) = brokerage();
    let account = brokerage.register("erin", None).await.unwrap();

    let bought = brokerage
        .submit_trade(account.id, TradeSide::Buy, "aapl", 10)
        .await;
    assert!(bought.is_committed());

    oracle.set_price("AAPL", dec!(160)).unwrap();
    let valuation = brokerage.get_valuation(account.id).await.unwrap();
    assert_eq!(valuation.cash, dec!(8500));
    assert_eq!(valuation.holdings_value, dec!(1600));
    assert_eq!(valuation.net_worth, dec!(10100));

    let sold = brokerage
        .submit_trade(account.id, TradeSide::Sell, "AAPL", 4)
        .await;
    assert!(sold.is_committed());

    let history = brokerage.get_history(account.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].quantity_delta, 10);
    assert_eq!(history[1].quantity_delta, -4);
    assert_eq!(history[1].unit_price, dec!(160));
}

#[tokio::test]
async fn rejected_trades_are_results_not_errors() {
    let (brokerage, _) = brokerage();
    let account = brokerage.register("frank", Some(dec!(100))).await.unwrap();

    let result = brokerage
        .submit_trade(account.id, TradeSide::Buy, "AAPL", 1)
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::InsufficientFunds));
    assert!(brokerage.get_history(account.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_streams_in_pages_and_resumes() {
    let (brokerage, _) = brokerage();
    let account = brokerage.register("grace", Some(dec!(1000))).await.unwrap();
    for _ in 0..7 {
        assert!(brokerage
            .submit_trade(account.id, TradeSide::Buy, "NFLX", 1)
            .await
            .is_committed());
    }

    let all: Vec<_> = brokerage
        .history_stream(account.id, 3)
        .try_collect()
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|entry| entry.id).collect();
    assert_eq!(ids.len(), 7);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    // Stop part way through, then pick up from the last entry seen.
    let first: Vec<_> = brokerage
        .history_stream(account.id, 3)
        .take(4)
        .try_collect()
        .await
        .unwrap();
    let resumed: Vec<_> = brokerage
        .history_stream_after(account.id, first.last().map(|entry| entry.id), 3)
        .try_collect()
        .await
        .unwrap();
    let stitched: Vec<_> = first.iter().chain(resumed.iter()).map(|entry| entry.id).collect();
    assert_eq!(stitched, ids);
}

#[tokio::test]
async fn history_of_an_unknown_account_is_an_error() {
    let (brokerage, _) = brokerage();
    assert_eq!(
        brokerage.get_history(99).await.unwrap_err(),
        EngineError::Ledger(LedgerError::AccountNotFound(99))
    );

    let streamed: Vec<_> = brokerage.history_stream(99, 10).collect().await;
    assert_eq!(streamed.len(), 1);
    assert!(streamed[0].is_err());
}

#[tokio::test]
async fn quotes_are_looked_up_by_normalized_symbol() {
    let (brokerage, oracle) = brokerage();

    let quote = brokerage.quote(" aapl ").await.unwrap();
    assert_eq!(quote.symbol, "AAPL");
    assert_eq!(quote.name, "Apple Inc.");

    assert!(matches!(brokerage.quote("").await, Err(EngineError::Validation(_))));
    assert!(matches!(brokerage.quote("ZZZZ").await, Err(EngineError::Oracle(err)) if err.is_not_found()));
    assert_eq!(oracle.requests(), 2);
}

#[tokio::test]
async fn deposits_must_be_positive() {
    let (brokerage, _) = brokerage();
    let account = brokerage.register("heidi", Some(dec!(10))).await.unwrap();

    assert_eq!(brokerage.adjust_cash(account.id, dec!(15.5)).await.unwrap(), dec!(25.5));
    for delta in [dec!(0), dec!(-3)] {
        assert!(matches!(
            brokerage.adjust_cash(account.id, delta).await,
            Err(EngineError::Validation(_))
        ));
    }
    assert_eq!(brokerage.account(account.id).await.unwrap().cash, dec!(25.5));
}
