//! Volume-spike options backtester CLI.
//!
//! # Usage
//!
//! ```bash
//! # Scan and backtest the most recent expirations of the configured ticker
//! volspike-backtest run --config config/default.toml
//!
//! # Generate signals for one expiration
//! volspike-backtest signals --expiration 2023-06-16 --ticker BMY
//!
//! # Replay a persisted transaction log
//! volspike-backtest backtest --expiration 2023-06-16 \
//!     --transactions results/transactions_BMY_2023-06-16.csv
//!
//! # List expirations and strike counts
//! volspike-backtest explore --ticker BMY
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use volspike_backtest::{
    Credentials, MarketDataProvider, Orchestrator, RunConfig, ThetaDataClient, TransactionLog,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "volspike-backtest")]
#[command(about = "Volume-spike signal generation and backtesting for listed options")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    /// Underlying ticker, overriding the configuration
    #[arg(short, long, global = true)]
    ticker: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and backtest the most recent expirations
    Run,

    /// Generate and persist the transaction log of one expiration
    Signals {
        /// Expiration date (YYYY-MM-DD)
        #[arg(short, long)]
        expiration: String,
    },

    /// Backtest a persisted transaction log
    Backtest {
        /// Expiration date (YYYY-MM-DD)
        #[arg(short, long)]
        expiration: String,

        /// Transaction log CSV; defaults to the file `signals` writes
        #[arg(long)]
        transactions: Option<PathBuf>,
    },

    /// List available expirations and strike counts
    Explore,
}

fn load_config(path: &Path, ticker: Option<String>) -> Result<RunConfig> {
    let mut config = if path.exists() {
        RunConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        tracing::warn!("{} not found, using defaults", path.display());
        RunConfig::default()
    };
    if let Some(ticker) = ticker {
        config.ticker = ticker.to_uppercase();
    }
    config.validate()?;
    Ok(config)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").context("Invalid expiration date format")
}

fn build_client(config: &RunConfig) -> Result<ThetaDataClient> {
    let credentials =
        Credentials::load(&config.provider).context("Failed to load terminal credentials")?;
    Ok(ThetaDataClient::new(&config.provider.base_url, credentials))
}

async fn cmd_run(config: RunConfig) -> Result<()> {
    let client = build_client(&config)?;
    let mut orchestrator = Orchestrator::new(config, client).with_progress_bar();

    let report = orchestrator.run().await.context("Batch run failed")?;

    for summary in report.completed() {
        println!("\n{}", summary.backtest.summary());
    }
    println!("\n{}", report.summary());
    Ok(())
}

async fn cmd_signals(config: RunConfig, expiration: NaiveDate) -> Result<()> {
    let ticker = config.ticker.clone();
    let client = build_client(&config)?;
    let mut orchestrator = Orchestrator::new(config, client);

    let path = orchestrator
        .generate_signals(&ticker, expiration)
        .await
        .with_context(|| format!("Signal generation failed for {} {}", ticker, expiration))?;

    println!("Created Signals: {}", path.display());
    Ok(())
}

async fn cmd_backtest(
    config: RunConfig,
    expiration: NaiveDate,
    transactions: Option<PathBuf>,
) -> Result<()> {
    let ticker = config.ticker.clone();
    let path = transactions.unwrap_or_else(|| {
        config
            .output_dir
            .join(TransactionLog::file_name(&ticker, expiration))
    });
    let client = build_client(&config)?;
    let mut orchestrator = Orchestrator::new(config, client);

    let result = orchestrator
        .backtest_file(&path, &ticker, expiration)
        .await
        .with_context(|| format!("Backtest failed for {}", path.display()))?;

    println!("{}", result.summary());
    Ok(())
}

async fn cmd_explore(config: RunConfig) -> Result<()> {
    let mut client = build_client(&config)?;
    let ticker = &config.ticker;

    client
        .connect()
        .await
        .context("Theta Terminal is not reachable")?;

    println!("{}", SEPARATOR);
    println!("Expirations for {}", ticker);
    println!("{}", SEPARATOR);

    let result = print_expirations(&mut client, ticker, config.max_expirations).await;
    client.disconnect().await;
    result
}

async fn print_expirations(
    client: &mut ThetaDataClient,
    ticker: &str,
    max_expirations: usize,
) -> Result<()> {
    let expirations = client
        .list_expirations(ticker)
        .await
        .context("Failed to list expirations")?;
    println!("Total expirations: {}", expirations.len());

    let skip = expirations.len().saturating_sub(max_expirations);
    for &expiration in &expirations[skip..] {
        match client.list_strikes(ticker, expiration).await {
            Ok(strikes) => println!("  {}: {} strikes", expiration, strikes.len()),
            Err(e) => println!("  {}: ERROR - {}", expiration, e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("volspike_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config, cli.ticker)?;

    match cli.command {
        Commands::Run => cmd_run(config).await?,
        Commands::Signals { expiration } => {
            let expiration = parse_date(&expiration)?;
            cmd_signals(config, expiration).await?;
        }
        Commands::Backtest {
            expiration,
            transactions,
        } => {
            let expiration = parse_date(&expiration)?;
            cmd_backtest(config, expiration, transactions).await?;
        }
        Commands::Explore => cmd_explore(config).await?,
    }

    Ok(())
}
