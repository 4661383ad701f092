//! Core backtesting engine.
//!
//! Replays a transaction log strike by strike:
//! 1. Sort the log by transaction date and collect its distinct strikes
//! 2. Fetch the strike's price series over the lookback window
//! 3. Apply BUY/SELL events to a fresh position in date order
//! 4. Liquidate what is still owned at the last close
//! 5. Sum per-strike profit into the total
//!
//! A strike whose prices cannot be fetched, or whose transaction dates have no
//! matching bar, is recorded as a failure and contributes no profit.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{Contract, DateWindow, MarketDataProvider, OptionRight, PriceSeries, ProviderError};
use crate::ledger::{Transaction, TransactionLog, TransactionType};

use super::position::Position;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Price fetch failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("No bar on {date} for strike {strike}")]
    MissingClose { strike: Decimal, date: NaiveDate },

    #[error("No bars to liquidate strike {strike}")]
    EmptySeries { strike: Decimal },
}

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Calendar days of history before expiration.
    pub lookback_days: i64,

    /// Right whose closes price every transaction at a strike.
    ///
    /// Defaults to calls for both BUY and SELL events, so put-derived SELL
    /// events are priced off the call series.
    pub pricing_right: OptionRight,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            pricing_right: OptionRight::Call,
        }
    }
}

/// Price curve and event markers for plotting one strike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrikeChart {
    pub closes: Vec<(NaiveDate, Decimal)>,
    pub buys: Vec<(NaiveDate, Decimal)>,
    pub sells: Vec<(NaiveDate, Decimal)>,
}

/// Replay outcome for one strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeResult {
    pub strike: Decimal,
    pub profit: Decimal,

    /// Transactions applied, including SELLs that found nothing to close.
    pub transactions: usize,

    /// Units still owned at the end and closed at the last price.
    pub liquidated_units: u32,

    pub chart: StrikeChart,
}

/// A strike that could not be replayed.
#[derive(Debug)]
pub struct StrikeFailure {
    pub strike: Decimal,
    pub error: BacktestError,
}

/// Result of backtesting one expiration.
#[derive(Debug)]
pub struct BacktestResult {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub strikes: Vec<StrikeResult>,
    pub failures: Vec<StrikeFailure>,
    pub total_profit: Decimal,
}

impl BacktestResult {
    pub fn strike(&self, strike: Decimal) -> Option<&StrikeResult> {
        self.strikes.iter().find(|s| s.strike == strike)
    }

    /// True when every strike in the log was replayed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Backtest Results {} {}", self.ticker, self.expiration),
            "----------------------------------------".to_string(),
        ];
        for s in &self.strikes {
            lines.push(format!(
                "Strike {}: Profit: {:.2} ({} transactions, {} liquidated)",
                s.strike, s.profit, s.transactions, s.liquidated_units
            ));
        }
        for f in &self.failures {
            lines.push(format!("Strike {}: FAILED - {}", f.strike, f.error));
        }
        lines.push(format!("Total Profit: {:.2}", self.total_profit));
        lines.join("\n")
    }
}

/// Replay one strike's transactions against its price series.
///
/// Transactions are applied in the order given; callers pass them sorted by
/// date. A SELL with nothing owned needs no price and is skipped.
pub fn replay<'a, I>(series: &PriceSeries, transactions: I) -> Result<StrikeResult, BacktestError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let strike = series.contract().strike;
    let close_on = |date: NaiveDate| {
        series
            .close_on(date)
            .ok_or(BacktestError::MissingClose { strike, date })
    };

    let mut position = Position::new();
    let mut chart = StrikeChart {
        closes: series.bars().iter().map(|b| (b.date, b.close)).collect(),
        ..Default::default()
    };
    let mut count = 0;

    for t in transactions {
        count += 1;
        match t.transaction_type {
            TransactionType::Buy => {
                let close = close_on(t.transaction_date)?;
                position.buy(close);
                chart.buys.push((t.transaction_date, close));
            }
            TransactionType::Sell => {
                if !position.is_flat() {
                    position.sell(close_on(t.transaction_date)?);
                }
                if let Some(close) = series.close_on(t.transaction_date) {
                    chart.sells.push((t.transaction_date, close));
                }
            }
        }
    }

    let liquidated_units = if position.is_flat() {
        0
    } else {
        let last_close = series
            .last_close()
            .ok_or(BacktestError::EmptySeries { strike })?;
        position.liquidate(last_close)
    };

    Ok(StrikeResult {
        strike,
        profit: position.profit(),
        transactions: count,
        liquidated_units,
        chart,
    })
}

/// The main backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Backtest a transaction log for one ticker and expiration.
    pub async fn run<P: MarketDataProvider + ?Sized>(
        &self,
        provider: &mut P,
        log: &TransactionLog,
        ticker: &str,
        expiration: NaiveDate,
    ) -> BacktestResult {
        let mut log = log.clone();
        log.sort_by_date();

        let window = DateWindow::lookback(expiration, self.config.lookback_days);
        let mut strikes = Vec::new();
        let mut failures = Vec::new();

        for strike in log.strikes() {
            let contract = Contract::new(ticker, strike, expiration, self.config.pricing_right);

            let outcome = match provider.price_series(&contract, window).await {
                Ok(series) => replay(&series, log.for_strike(strike)),
                Err(e) => Err(e.into()),
            };

            match outcome {
                Ok(result) => {
                    info!("Strike {}: Profit: {:.2}", strike, result.profit);
                    strikes.push(result);
                }
                Err(error) => {
                    warn!("Strike {} not backtested: {}", strike, error);
                    failures.push(StrikeFailure { strike, error });
                }
            }
        }

        let total_profit: Decimal = strikes.iter().map(|s| s.profit).sum();
        info!("{} {}: Total Profit: {:.2}", ticker, expiration, total_profit);

        BacktestResult {
            ticker: ticker.to_string(),
            expiration,
            strikes,
            failures,
            total_profit,
        }
    }
}
