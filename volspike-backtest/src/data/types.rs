//! Core data types for option price history.
//!
//! These types describe a single option contract and its end-of-day bars,
//! independent of the vendor that supplied them.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Option right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl OptionRight {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// A single listed option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract {
    /// Underlying symbol (e.g., "BMY")
    pub ticker: String,

    /// Strike price
    pub strike: Decimal,

    /// Option expiration date
    pub expiration: NaiveDate,

    /// Call or put
    pub right: OptionRight,
}

impl Contract {
    pub fn new(ticker: &str, strike: Decimal, expiration: NaiveDate, right: OptionRight) -> Self {
        Self {
            ticker: ticker.to_string(),
            strike,
            expiration,
            right,
        }
    }
}

impl std::fmt::Display for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.ticker, self.expiration, self.strike, self.right
        )
    }
}

/// Inclusive date range for a history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `days` calendar days ending on (and including) `end`.
    pub fn lookback(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One trading day for a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,

    /// Contracts traded
    pub volume: i64,

    /// Number of trades
    pub count: i64,
}

#[derive(Error, Debug, PartialEq)]
pub enum SeriesError {
    #[error("Bar dates must be strictly increasing: {previous} followed by {next}")]
    NotIncreasing { previous: NaiveDate, next: NaiveDate },
}

/// Ordered daily bars for one contract.
///
/// Dates are strictly increasing; the constructor rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    contract: Contract,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(contract: Contract, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(SeriesError::NotIncreasing {
                previous: w[0].date,
                next: w[1].date,
            });
        }
        Ok(Self { contract, bars })
    }

    pub fn empty(contract: Contract) -> Self {
        Self {
            contract,
            bars: Vec::new(),
        }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar for an exact date.
    pub fn bar_on(&self, date: NaiveDate) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|idx| &self.bars[idx])
    }

    /// Close price on an exact date.
    pub fn close_on(&self, date: NaiveDate) -> Option<Decimal> {
        self.bar_on(date).map(|b| b.close)
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.bars.last().map(|b| b.close)
    }

    /// Volumes as floats, in date order.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
    }

    fn bar(day: u32, close: Decimal) -> Bar {
        Bar {
            date: date(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10,
            count: 1,
        }
    }

    fn contract() -> Contract {
        Contract::new("BMY", dec!(65), date(31), OptionRight::Call)
    }

    #[test]
    fn test_option_right_parsing() {
        assert_eq!(OptionRight::from_str("C"), Some(OptionRight::Call));
        assert_eq!(OptionRight::from_str("P"), Some(OptionRight::Put));
        assert_eq!(OptionRight::from_str("call"), Some(OptionRight::Call));
        assert_eq!(OptionRight::from_str("PUT"), Some(OptionRight::Put));
        assert_eq!(OptionRight::from_str("X"), None);
    }

    #[test]
    fn test_lookback_window() {
        let exp = NaiveDate::from_ymd_opt(2023, 6, 16).unwrap();
        let window = DateWindow::lookback(exp, 90);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2023, 3, 18).unwrap());
        assert_eq!(window.end, exp);
        assert!(window.contains(exp));
        assert!(!window.contains(exp + Duration::days(1)));
    }

    #[test]
    fn test_series_rejects_unordered_dates() {
        let err = PriceSeries::new(contract(), vec![bar(2, dec!(1)), bar(2, dec!(2))]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::NotIncreasing {
                previous: date(2),
                next: date(2)
            }
        );
        assert!(PriceSeries::new(contract(), vec![bar(3, dec!(1)), bar(1, dec!(2))]).is_err());
    }

    #[test]
    fn test_series_lookups() {
        let series =
            PriceSeries::new(contract(), vec![bar(1, dec!(1.5)), bar(2, dec!(2.0)), bar(6, dec!(3.25))])
                .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.close_on(date(2)), Some(dec!(2.0)));
        assert_eq!(series.close_on(date(3)), None);
        assert_eq!(series.last_close(), Some(dec!(3.25)));
        assert!(PriceSeries::empty(contract()).last_close().is_none());
    }
}
