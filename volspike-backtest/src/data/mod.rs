pub mod provider;
pub mod thetadata;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use provider::{MarketDataProvider, ProviderError};
pub use thetadata::{BarSchema, ThetaDataClient};
pub use types::{Bar, Contract, DateWindow, OptionRight, PriceSeries, SeriesError};
