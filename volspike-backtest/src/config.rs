//! Run configuration.
//!
//! Loaded once from a TOML file and passed explicitly to the orchestrator.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backtest::BacktestConfig;
use crate::data::thetadata::DEFAULT_BASE_URL;
use crate::data::OptionRight;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the volume-spike rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Calendar days of history before expiration.
    pub lookback_days: i64,

    /// Minimum number of bars for a series to be scanned.
    pub min_bars: usize,

    /// Standard deviations above the mean volume that flag a bar.
    pub sigma_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            min_bars: 11,
            sigma_multiplier: 3.0,
        }
    }
}

/// Market data terminal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub username: Option<String>,

    /// File holding the account password.
    pub password_file: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password_file: None,
        }
    }
}

/// Configuration for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Underlying to scan.
    pub ticker: String,

    /// Number of most recent expirations to process.
    pub max_expirations: usize,

    /// Directory for persisted transaction logs.
    pub output_dir: PathBuf,

    /// Series used to price backtested transactions. Calls by default, also
    /// for put-derived SELL events.
    pub pricing_right: OptionRight,

    pub signal: SignalConfig,

    pub provider: ProviderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticker: "BMY".to_string(),
            max_expirations: 50,
            output_dir: PathBuf::from("results"),
            pricing_right: OptionRight::Call,
            signal: SignalConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Backtest settings sharing the signal lookback window.
    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            lookback_days: self.signal.lookback_days,
            pricing_right: self.pricing_right,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::Invalid("ticker must not be empty".to_string()));
        }
        if self.signal.lookback_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be positive, got {}",
                self.signal.lookback_days
            )));
        }
        // Sample standard deviation needs at least two observations.
        if self.signal.min_bars < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_bars must be at least 2, got {}",
                self.signal.min_bars
            )));
        }
        if !self.signal.sigma_multiplier.is_finite() || self.signal.sigma_multiplier < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sigma_multiplier must be a non-negative number, got {}",
                self.signal.sigma_multiplier
            )));
        }
        Ok(())
    }
}

/// Terminal account credentials, read once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Read credentials described by the provider config.
    ///
    /// Returns `None` when no username is configured.
    pub fn load(config: &ProviderConfig) -> Result<Option<Self>, ConfigError> {
        let Some(username) = &config.username else {
            return Ok(None);
        };
        let path = config.password_file.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!("no password_file configured for user {}", username))
        })?;
        let password = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Some(Self::new(username, password.trim())))
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
