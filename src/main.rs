use anyhow::Context;
use api_client::{HttpPriceOracle, PriceOracle};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{CellAlignment, Table};
use configuration::{Config, ConfigArgs};
use core_types::{format_usd, normalize_symbol, AccountId, TradeSide};
use database::connection::{connect, run_migrations};
use database::repository::DbRepository;
use engine::Brokerage;
use executor::TradeResult;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;

/// The main entry point for the Stockbook paper-trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Load configuration (config.toml, STOCKBOOK_* variables, .env) and start logging.
    let config = cli.config.load().context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&config.logging)?;
    tracing::debug!(
        oracle = %config.oracle.base_url,
        max_attempts = config.executor.max_attempts,
        "Configuration loaded."
    );

    // Execute the appropriate command
    match cli.command {
        Commands::Migrate => {
            let pool = connect(&config.database).await?;
            run_migrations(&pool).await?;
            println!("Ledger migrations are up to date.");
        }
        Commands::Quote { symbol } => {
            // Quoting needs no ledger, so no database connection is made.
            let oracle = HttpPriceOracle::new(&config.oracle)?;
            let quote = oracle.quote(&normalize_symbol(&symbol)?).await?;
            println!("A share of {} ({}) costs {}.", quote.name, quote.symbol, format_usd(quote.price));
        }
        command => {
            let brokerage = connect_brokerage(&config).await?;
            handle_ledger_command(command, &brokerage).await?;
        }
    }
    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A paper-trading stock ledger: register, deposit, quote, buy, sell and review.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account.
    Register {
        username: String,
        /// Starting cash. Defaults to `accounts.default_initial_cash`.
        #[arg(long)]
        cash: Option<Decimal>,
    },
    /// Add cash to an account.
    Deposit {
        #[arg(long)]
        account: AccountId,
        amount: Decimal,
    },
    /// Look up the current price of a stock.
    Quote { symbol: String },
    /// Buy whole shares at the current price.
    Buy(TradeArgs),
    /// Sell whole shares at the current price.
    Sell(TradeArgs),
    /// Show cash, holdings and net worth.
    Portfolio {
        #[arg(long)]
        account: AccountId,
    },
    /// List every trade of an account, oldest first.
    History {
        #[arg(long)]
        account: AccountId,
        /// Entries fetched per round trip to the database.
        #[arg(long, default_value_t = engine::HISTORY_PAGE_SIZE)]
        page_size: usize,
    },
    /// Apply the database migrations and exit.
    Migrate,
}

#[derive(Parser)]
struct TradeArgs {
    #[arg(long)]
    account: AccountId,
    /// The ticker symbol (e.g., "AAPL").
    symbol: String,
    /// A positive whole number of shares.
    #[arg(allow_negative_numbers = true)]
    shares: i64,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn connect_brokerage(config: &Config) -> anyhow::Result<Brokerage> {
    let pool = connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let oracle: Arc<dyn PriceOracle> = Arc::new(HttpPriceOracle::new(&config.oracle)?);
    Ok(Brokerage::from_config(
        Arc::new(DbRepository::new(pool)),
        oracle,
        config,
    ))
}

async fn handle_ledger_command(command: Commands, brokerage: &Brokerage) -> anyhow::Result<()> {
    match command {
        Commands::Register { username, cash } => {
            let account = brokerage.register(&username, cash).await?;
            println!(
                "Registered '{}' as account {} with {}.",
                account.username,
                account.id,
                format_usd(account.cash)
            );
        }
        Commands::Deposit { account, amount } => {
            let cash = brokerage.adjust_cash(account, amount).await?;
            println!("Deposited {}. Cash is now {}.", format_usd(amount), format_usd(cash));
        }
        Commands::Buy(args) => handle_trade(brokerage, TradeSide::Buy, args).await?,
        Commands::Sell(args) => handle_trade(brokerage, TradeSide::Sell, args).await?,
        Commands::Portfolio { account } => print_portfolio(brokerage, account).await?,
        Commands::History { account, page_size } => print_history(brokerage, account, page_size).await?,
        Commands::Quote { .. } | Commands::Migrate => {
            anyhow::bail!("command does not operate on the ledger")
        }
    }
    Ok(())
}

async fn handle_trade(brokerage: &Brokerage, side: TradeSide, args: TradeArgs) -> anyhow::Result<()> {
    match brokerage
        .submit_trade(args.account, side, &args.symbol, args.shares)
        .await
    {
        TradeResult::Committed(entry) => {
            let verb = match side {
                TradeSide::Buy => "Bought",
                TradeSide::Sell => "Sold",
            };
            println!(
                "{} {} {} at {} for {}.",
                verb,
                entry.shares(),
                entry.symbol,
                format_usd(entry.unit_price),
                format_usd(entry.cash_delta.abs())
            );
            Ok(())
        }
        TradeResult::Rejected(rejection) => Err(rejection.into()),
        TradeResult::Failed(err) => Err(err.into()),
    }
}

async fn print_portfolio(brokerage: &Brokerage, account_id: AccountId) -> anyhow::Result<()> {
    let valuation = brokerage.get_valuation(account_id).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Symbol", "Name", "Shares", "Price", "TOTAL"]);
    for position in &valuation.positions {
        let (name, price, total) = match &position.quote {
            analytics::PositionQuote::Priced {
                name,
                price,
                market_value,
            } => (name.clone(), format_usd(*price), format_usd(*market_value)),
            analytics::PositionQuote::Unavailable { reason } => {
                ("(unavailable)".to_string(), "-".to_string(), reason.clone())
            }
        };
        table.add_row(vec![
            position.symbol.clone(),
            name,
            position.shares.to_string(),
            price,
            total,
        ]);
    }
    let cash = format_usd(valuation.cash);
    let net_worth = format_usd(valuation.net_worth);
    table.add_row(vec!["CASH", "", "", "", cash.as_str()]);
    table.add_row(vec!["", "", "", "", net_worth.as_str()]);
    for column in table.column_iter_mut().skip(2) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("{table}");

    if valuation.is_partial() {
        println!(
            "Net worth excludes unpriced holdings: {}.",
            valuation.unavailable_symbols().join(", ")
        );
    } else if let Some(profit_loss) = valuation.profit_loss() {
        println!("Profit/loss against {} contributed: {}", format_usd(valuation.contributions), format_usd(profit_loss));
    }
    Ok(())
}

async fn print_history(brokerage: &Brokerage, account_id: AccountId, page_size: usize) -> anyhow::Result<()> {
    // Unknown accounts are an error even when they would have no entries.
    brokerage.account(account_id).await?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Symbol", "Shares", "Price", "Transacted"]);

    let mut entries = brokerage.history_stream(account_id, page_size);
    while let Some(entry) = entries.try_next().await? {
        table.add_row(vec![
            entry.symbol.clone(),
            entry.quantity_delta.to_string(),
            format_usd(entry.unit_price),
            entry.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
