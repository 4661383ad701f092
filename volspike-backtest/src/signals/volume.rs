//! Whole-series volume anomaly detection.
//!
//! A bar is anomalous when its volume strictly exceeds
//! `mean + k * stddev`, with mean and sample standard deviation taken over
//! the entire series (the bar itself included), not a rolling window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::config::SignalConfig;
use crate::data::{Contract, PriceSeries};
use crate::ledger::{Transaction, TransactionType};

/// Volume statistics for one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    pub observations: usize,
    pub mean: f64,

    /// Sample standard deviation (n - 1).
    pub std_dev: f64,

    /// Volume a bar must strictly exceed to be flagged.
    pub threshold: f64,
}

impl VolumeStats {
    /// Returns `None` for fewer than two observations.
    pub fn compute(volumes: &[f64], sigma_multiplier: f64) -> Option<Self> {
        if volumes.len() < 2 {
            return None;
        }
        let mean = volumes.iter().mean();
        let std_dev = volumes.iter().std_dev();

        Some(Self {
            observations: volumes.len(),
            mean,
            std_dev,
            threshold: mean + sigma_multiplier * std_dev,
        })
    }

    pub fn is_anomalous(&self, volume: f64) -> bool {
        volume > self.threshold
    }
}

/// A flagged bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub volume: i64,
    pub threshold: f64,
    pub action: TransactionType,
}

impl Signal {
    pub fn to_transaction(&self, contract: &Contract) -> Transaction {
        Transaction {
            transaction_date: self.date,
            ticker: contract.ticker.clone(),
            strike: contract.strike,
            exp_date: contract.expiration,
            transaction_type: self.action,
        }
    }
}

/// Outcome of scanning one series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesScan {
    /// Too few bars to judge; not an error.
    Insufficient { bars: usize },
    Scanned {
        stats: VolumeStats,
        signals: Vec<Signal>,
    },
}

impl SeriesScan {
    pub fn signals(&self) -> &[Signal] {
        match self {
            Self::Insufficient { .. } => &[],
            Self::Scanned { signals, .. } => signals,
        }
    }
}

/// Flag the anomalous bars of a series.
pub fn scan_series(series: &PriceSeries, config: &SignalConfig) -> SeriesScan {
    if series.len() < config.min_bars {
        return SeriesScan::Insufficient { bars: series.len() };
    }

    let Some(stats) = VolumeStats::compute(&series.volumes(), config.sigma_multiplier) else {
        return SeriesScan::Insufficient { bars: series.len() };
    };

    let action = TransactionType::from_right(series.contract().right);
    let signals = series
        .bars()
        .iter()
        .filter(|bar| stats.is_anomalous(bar.volume as f64))
        .map(|bar| Signal {
            date: bar.date,
            volume: bar.volume,
            threshold: stats.threshold,
            action,
        })
        .collect();

    SeriesScan::Scanned { stats, signals }
}
