pub mod backtest;
pub mod config;
pub mod data;
pub mod ledger;
pub mod orchestrator;
pub mod signals;

// Re-export commonly used types
pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult, Position, StrikeResult};
pub use config::{ConfigError, Credentials, RunConfig, SignalConfig};
pub use data::{Contract, MarketDataProvider, OptionRight, PriceSeries, ProviderError, ThetaDataClient};
pub use ledger::{LedgerError, Transaction, TransactionLog, TransactionType};
pub use orchestrator::{ExpirationRunError, Orchestrator, RunReport};
pub use signals::{SignalGenerator, VolumeStats};
