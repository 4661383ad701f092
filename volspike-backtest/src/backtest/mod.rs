//! Backtesting engine for volume-spike transactions.
//!
//! This module replays a transaction log against option closes:
//! - Per-strike position tracking (units owned, running profit)
//! - Overwriting SELL semantics and end-of-window liquidation
//! - Per-strike and total profit, with chart data for each strike

pub mod engine;
pub mod position;

pub use engine::{
    replay, BacktestConfig, BacktestEngine, BacktestError, BacktestResult, StrikeChart,
    StrikeFailure, StrikeResult,
};
pub use position::Position;
