//! Batch runner over a ticker's expirations.
//!
//! One provider session brackets the whole batch. Each expiration runs
//! generate, persist, reload and backtest in sequence; a failure in any step
//! is logged and recorded for that expiration only.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

use crate::backtest::{BacktestEngine, BacktestResult};
use crate::config::RunConfig;
use crate::data::{MarketDataProvider, ProviderError};
use crate::ledger::{LedgerError, TransactionLog};
use crate::signals::SignalGenerator;

const SEPARATOR: &str = "============================================================";

/// Failure of one expiration's generate/backtest cycle.
#[derive(Error, Debug)]
pub enum ExpirationRunError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transaction log error: {0}")]
    Ledger(#[from] LedgerError),
}

/// A completed expiration.
#[derive(Debug)]
pub struct ExpirationSummary {
    pub log_path: PathBuf,
    pub transactions: usize,
    pub backtest: BacktestResult,
}

#[derive(Debug)]
pub struct ExpirationRun {
    pub expiration: NaiveDate,
    pub outcome: Result<ExpirationSummary, ExpirationRunError>,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct RunReport {
    pub ticker: String,
    pub runs: Vec<ExpirationRun>,
}

impl RunReport {
    pub fn completed(&self) -> impl Iterator<Item = &ExpirationSummary> {
        self.runs.iter().filter_map(|r| r.outcome.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (NaiveDate, &ExpirationRunError)> {
        self.runs
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.expiration, e)))
    }

    /// Profit summed over every completed expiration.
    pub fn total_profit(&self) -> Decimal {
        self.completed().map(|s| s.backtest.total_profit).sum()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            SEPARATOR.to_string(),
            format!("Run Report: {}", self.ticker),
            SEPARATOR.to_string(),
        ];
        for run in &self.runs {
            match &run.outcome {
                Ok(s) => lines.push(format!(
                    "{}: {} transactions, {} strikes, profit {:.2}",
                    run.expiration,
                    s.transactions,
                    s.backtest.strikes.len(),
                    s.backtest.total_profit
                )),
                Err(e) => lines.push(format!("{}: FAILED - {}", run.expiration, e)),
            }
        }
        lines.push(String::new());
        lines.push(format!(
            "Expirations: {} completed, {} failed",
            self.completed().count(),
            self.failed().count()
        ));
        lines.push(format!("Total Profit: {:.2}", self.total_profit()));
        lines.join("\n")
    }
}

/// Drives signal generation and backtesting for one ticker.
pub struct Orchestrator<P: MarketDataProvider> {
    config: RunConfig,
    provider: P,
    generator: SignalGenerator,
    engine: BacktestEngine,
    progress: ProgressBar,
}

impl<P: MarketDataProvider> Orchestrator<P> {
    pub fn new(config: RunConfig, provider: P) -> Self {
        let generator = SignalGenerator::new(config.signal.clone());
        let engine = BacktestEngine::new(config.backtest_config());
        Self {
            config,
            provider,
            generator,
            engine,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show a progress bar over expirations.
    pub fn with_progress_bar(mut self) -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        self.progress = pb;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run the configured ticker.
    pub async fn run(&mut self) -> Result<RunReport, ProviderError> {
        let ticker = self.config.ticker.clone();
        self.run_ticker(&ticker).await
    }

    /// Run the most recent expirations of `ticker`.
    ///
    /// Fails only if the session cannot be opened or expirations cannot be
    /// listed; the session is closed in every case once it was opened.
    pub async fn run_ticker(&mut self, ticker: &str) -> Result<RunReport, ProviderError> {
        self.provider.connect().await?;
        let report = self.run_expirations(ticker).await;
        self.provider.disconnect().await;
        report
    }

    async fn run_expirations(&mut self, ticker: &str) -> Result<RunReport, ProviderError> {
        let expirations = self.provider.list_expirations(ticker).await?;
        let skip = expirations.len().saturating_sub(self.config.max_expirations);
        let recent = &expirations[skip..];

        info!(
            "{}: {} expirations listed, processing the last {}",
            ticker,
            expirations.len(),
            recent.len()
        );

        self.progress.set_length(recent.len() as u64);
        let mut runs = Vec::with_capacity(recent.len());

        for &expiration in recent {
            self.progress.set_message(format!("{} {}", ticker, expiration));
            info!("Initiating with exp_date: {}", expiration);

            let outcome = self.run_expiration(ticker, expiration).await;
            match &outcome {
                Ok(summary) => info!(
                    "Back-tested {}: {} transactions, total profit {:.2}",
                    expiration, summary.transactions, summary.backtest.total_profit
                ),
                Err(e) => error!("Expiration {} failed: {}", expiration, e),
            }

            runs.push(ExpirationRun { expiration, outcome });
            self.progress.inc(1);
        }

        self.progress.finish_with_message(format!("{} complete", ticker));

        Ok(RunReport {
            ticker: ticker.to_string(),
            runs,
        })
    }

    async fn run_expiration(
        &mut self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<ExpirationSummary, ExpirationRunError> {
        let (log_path, transactions) = self.generate_and_persist(ticker, expiration).await?;

        let log = TransactionLog::read_csv(&log_path, ticker, expiration)?;
        let backtest = self
            .engine
            .run(&mut self.provider, &log, ticker, expiration)
            .await;

        Ok(ExpirationSummary {
            log_path,
            transactions,
            backtest,
        })
    }

    async fn generate_and_persist(
        &mut self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<(PathBuf, usize), ExpirationRunError> {
        let log = self
            .generator
            .generate(&mut self.provider, ticker, expiration)
            .await?;

        let path = log.path_in(&self.config.output_dir);
        log.write_csv(&path)?;
        info!("Created Signals: {} ({} transactions)", expiration, log.len());

        Ok((path, log.len()))
    }

    /// Generate and persist a single expiration in its own session.
    pub async fn generate_signals(
        &mut self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<PathBuf, ExpirationRunError> {
        self.provider.connect().await?;
        let result = self.generate_and_persist(ticker, expiration).await;
        self.provider.disconnect().await;
        result.map(|(path, _)| path)
    }

    /// Backtest a persisted transaction log in its own session.
    pub async fn backtest_file(
        &mut self,
        path: &Path,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<BacktestResult, ExpirationRunError> {
        let log = TransactionLog::read_csv(path, ticker, expiration)?;

        self.provider.connect().await?;
        let result = self
            .engine
            .run(&mut self.provider, &log, ticker, expiration)
            .await;
        self.provider.disconnect().await;

        Ok(result)
    }
}
