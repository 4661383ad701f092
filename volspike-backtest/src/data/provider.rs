//! Provider abstraction for option market data.
//!
//! The signal generator, backtest engine and orchestrator only talk to market
//! data through [`MarketDataProvider`]. Concrete vendors (see
//! [`ThetaDataClient`](super::thetadata::ThetaDataClient)) translate their wire
//! format into [`PriceSeries`] at this boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{Contract, DateWindow, PriceSeries, SeriesError};

/// Errors raised by a market data provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("No data available for {0}")]
    NoData(String),

    #[error("Bar schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid series: {0}")]
    Series(#[from] SeriesError),

    #[error("Provider session is not connected")]
    NotConnected,
}

/// Read interface over a source of option history.
///
/// Calls are awaited one at a time; implementations may keep per-session
/// state (rate limiting, connection status) behind `&mut self`.
#[async_trait]
pub trait MarketDataProvider: Send {
    /// Open the provider session.
    async fn connect(&mut self) -> Result<(), ProviderError>;

    /// Close the provider session. Never fails.
    async fn disconnect(&mut self);

    /// Listed expirations for an underlying, in provider order.
    async fn list_expirations(&mut self, ticker: &str) -> Result<Vec<NaiveDate>, ProviderError>;

    /// Listed strikes for an underlying and expiration.
    async fn list_strikes(
        &mut self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<Vec<Decimal>, ProviderError>;

    /// End-of-day bars for one contract over an inclusive date window.
    async fn price_series(
        &mut self,
        contract: &Contract,
        window: DateWindow,
    ) -> Result<PriceSeries, ProviderError>;
}
