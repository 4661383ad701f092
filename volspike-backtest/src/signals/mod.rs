//! Volume-spike signal generation.
//!
//! - Whole-series volume statistics and anomaly flagging
//! - Chain-wide scan of calls and puts for one expiration

pub mod generator;
pub mod volume;

pub use generator::{ScanSummary, SignalGenerator};
pub use volume::{scan_series, SeriesScan, Signal, VolumeStats};
