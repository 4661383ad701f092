//! In-memory provider for unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use super::provider::{MarketDataProvider, ProviderError};
use super::types::{Bar, Contract, DateWindow, OptionRight, PriceSeries};

type SeriesKey = (NaiveDate, Decimal, OptionRight);

#[derive(Default)]
pub struct InMemoryProvider {
    pub expirations: Vec<NaiveDate>,
    pub strikes: HashMap<NaiveDate, Vec<Decimal>>,
    series: HashMap<SeriesKey, Vec<Bar>>,
    failing: HashSet<SeriesKey>,
    failing_expirations: HashSet<NaiveDate>,
    failing_listing: bool,
    pub connected: bool,
    pub connect_calls: usize,
    pub disconnect_calls: usize,
    pub fetched: Vec<Contract>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(
        mut self,
        expiration: NaiveDate,
        strike: Decimal,
        right: OptionRight,
        bars: Vec<Bar>,
    ) -> Self {
        let strikes = self.strikes.entry(expiration).or_default();
        if !strikes.contains(&strike) {
            strikes.push(strike);
        }
        if !self.expirations.contains(&expiration) {
            self.expirations.push(expiration);
        }
        self.series.insert((expiration, strike, right), bars);
        self
    }

    /// Make every fetch for this contract fail.
    pub fn failing(mut self, expiration: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        self.failing.insert((expiration, strike, right));
        self
    }

    /// Make strike listing fail for an expiration.
    pub fn failing_expiration(mut self, expiration: NaiveDate) -> Self {
        if !self.expirations.contains(&expiration) {
            self.expirations.push(expiration);
        }
        self.failing_expirations.insert(expiration);
        self
    }

    /// Make expiration listing fail.
    pub fn failing_listing(mut self) -> Self {
        self.failing_listing = true;
        self
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    async fn connect(&mut self) -> Result<(), ProviderError> {
        self.connect_calls += 1;
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
    }

    async fn list_expirations(&mut self, ticker: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        if self.failing_listing {
            return Err(ProviderError::Api(format!("expirations unavailable for {}", ticker)));
        }
        Ok(self.expirations.clone())
    }

    async fn list_strikes(
        &mut self,
        _ticker: &str,
        expiration: NaiveDate,
    ) -> Result<Vec<Decimal>, ProviderError> {
        if self.failing_expirations.contains(&expiration) {
            return Err(ProviderError::Api(format!("strikes unavailable for {}", expiration)));
        }
        Ok(self.strikes.get(&expiration).cloned().unwrap_or_default())
    }

    async fn price_series(
        &mut self,
        contract: &Contract,
        window: DateWindow,
    ) -> Result<PriceSeries, ProviderError> {
        self.fetched.push(contract.clone());
        let key = (contract.expiration, contract.strike, contract.right);

        if self.failing.contains(&key) {
            return Err(ProviderError::Api(format!("fetch failed for {}", contract)));
        }

        let bars = self
            .series
            .get(&key)
            .ok_or_else(|| ProviderError::NoData(contract.to_string()))?
            .iter()
            .filter(|b| window.contains(b.date))
            .cloned()
            .collect();

        Ok(PriceSeries::new(contract.clone(), bars)?)
    }
}

/// Consecutive daily bars starting at `start`, one per volume.
pub fn bars_with_volumes(start: NaiveDate, volumes: &[i64]) -> Vec<Bar> {
    volumes
        .iter()
        .enumerate()
        .map(|(i, &volume)| Bar {
            date: start + Duration::days(i as i64),
            open: Decimal::ONE,
            high: Decimal::ONE,
            low: Decimal::ONE,
            close: Decimal::ONE,
            volume,
            count: volume / 10,
        })
        .collect()
}

/// Consecutive daily bars starting at `start`, one per close price.
pub fn bars_with_closes(start: NaiveDate, closes: &[Decimal]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: start + Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
            count: 10,
        })
        .collect()
}
