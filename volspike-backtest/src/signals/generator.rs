//! Signal generation across an expiration's option chain.
//!
//! For each strike, calls are scanned first and then puts. Every scan fetches
//! the contract's bars over the lookback window ending at expiration. A failed
//! fetch only skips that contract; the rest of the chain is still scanned.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::SignalConfig;
use crate::data::{Contract, DateWindow, MarketDataProvider, OptionRight, ProviderError};
use crate::ledger::TransactionLog;

use super::volume::{scan_series, SeriesScan};

/// Counters for one generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub contracts: usize,
    pub scanned: usize,
    pub insufficient: usize,
    pub failed: usize,
    pub signals: usize,
}

/// Scans every strike and right of an expiration for volume spikes.
pub struct SignalGenerator {
    config: SignalConfig,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// History window for an expiration.
    pub fn window(&self, expiration: NaiveDate) -> DateWindow {
        DateWindow::lookback(expiration, self.config.lookback_days)
    }

    /// Build the transaction log for one expiration.
    ///
    /// Only the strike listing can fail the whole pass.
    pub async fn generate<P: MarketDataProvider + ?Sized>(
        &self,
        provider: &mut P,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<TransactionLog, ProviderError> {
        let (log, _) = self.generate_with_summary(provider, ticker, expiration).await?;
        Ok(log)
    }

    pub async fn generate_with_summary<P: MarketDataProvider + ?Sized>(
        &self,
        provider: &mut P,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<(TransactionLog, ScanSummary), ProviderError> {
        let strikes = provider.list_strikes(ticker, expiration).await?;
        let window = self.window(expiration);

        let mut log = TransactionLog::new(ticker, expiration);
        let mut summary = ScanSummary::default();

        for right in [OptionRight::Call, OptionRight::Put] {
            for &strike in &strikes {
                let contract = Contract::new(ticker, strike, expiration, right);
                summary.contracts += 1;

                let series = match provider.price_series(&contract, window).await {
                    Ok(series) => series,
                    Err(e) => {
                        warn!("Skipping {}: {}", contract, e);
                        summary.failed += 1;
                        continue;
                    }
                };

                match scan_series(&series, &self.config) {
                    SeriesScan::Insufficient { bars } => {
                        debug!("Skipping {}: only {} bars", contract, bars);
                        summary.insufficient += 1;
                    }
                    SeriesScan::Scanned { stats, signals } => {
                        summary.scanned += 1;
                        if !signals.is_empty() {
                            debug!(
                                "{}: {} signal(s) above volume {:.1} (mean {:.1}, sd {:.1})",
                                contract,
                                signals.len(),
                                stats.threshold,
                                stats.mean,
                                stats.std_dev
                            );
                        }
                        for signal in &signals {
                            log.push(signal.to_transaction(&contract));
                        }
                        summary.signals += signals.len();
                    }
                }
            }
        }

        info!(
            "{} {}: {} strikes, {} contracts scanned, {} short, {} failed, {} signals",
            ticker,
            expiration,
            strikes.len(),
            summary.scanned,
            summary.insufficient,
            summary.failed,
            summary.signals
        );

        Ok((log, summary))
    }
}
