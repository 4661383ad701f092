//! Theta Terminal REST client for end-of-day option history.
//!
//! Talks to a locally running Theta Terminal (v2 HTTP API):
//! - `system/mdds/status` reports whether the terminal is logged in
//! - `list/expirations`, `list/strikes` enumerate the chain
//! - `hist/option/eod` returns daily bars for one contract
//!
//! Dates travel as `YYYYMMDD` integers and strikes in thousandths of a dollar.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Credentials;

use super::provider::{MarketDataProvider, ProviderError};
use super::types::{Bar, Contract, DateWindow, PriceSeries};

/// Default Theta Terminal address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:25510";

/// Minimum interval between requests.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(50);

/// Strikes are quoted in 1/1000 of a dollar.
const STRIKE_SCALE: u32 = 3;

/// Status code the terminal uses when a query matched nothing.
const NO_DATA_STATUS: u16 = 472;

/// Bar fields the end-of-day endpoint must provide.
pub const BAR_FIELDS: &[&str] = &["open", "high", "low", "close", "volume", "count", "date"];

/// Response header. `format` names the columns of each row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub format: Option<Vec<String>>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl ResponseHeader {
    /// The terminal reports "null" as a string when there is no error.
    fn error(&self) -> Option<String> {
        match self.error_type.as_deref() {
            None | Some("") | Some("null") => None,
            Some(kind) => Some(match self.error_msg.as_deref() {
                Some(msg) if !msg.is_empty() && msg != "null" => format!("{}: {}", kind, msg),
                _ => kind.to_string(),
            }),
        }
    }
}

/// Terminal response wrapper: `{"header": {...}, "response": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub header: ResponseHeader,
    pub response: T,
}

/// Column positions of the bar fields within a row.
///
/// Resolved by name from the header's `format` list so that a change in the
/// terminal's row layout fails loudly instead of shifting prices into the
/// wrong fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarSchema {
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    count: usize,
    date: usize,
    width: usize,
}

impl BarSchema {
    pub fn from_format(format: &[String]) -> Result<Self, ProviderError> {
        let position = |field: &str| {
            format
                .iter()
                .position(|name| name.eq_ignore_ascii_case(field))
                .ok_or_else(|| {
                    ProviderError::SchemaMismatch(format!(
                        "missing field '{}' in row format {:?}",
                        field, format
                    ))
                })
        };

        Ok(Self {
            open: position("open")?,
            high: position("high")?,
            low: position("low")?,
            close: position("close")?,
            volume: position("volume")?,
            count: position("count")?,
            date: position("date")?,
            width: format.len(),
        })
    }

    pub fn parse_row(&self, row: &[Value]) -> Result<Bar, ProviderError> {
        if row.len() != self.width {
            return Err(ProviderError::SchemaMismatch(format!(
                "row has {} fields, header declares {}",
                row.len(),
                self.width
            )));
        }

        let raw_date = integer_field(row, self.date, "date")?;
        let date = parse_date_int(raw_date).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("invalid bar date {}", raw_date))
        })?;

        Ok(Bar {
            date,
            open: price_field(row, self.open, "open")?,
            high: price_field(row, self.high, "high")?,
            low: price_field(row, self.low, "low")?,
            close: price_field(row, self.close, "close")?,
            volume: integer_field(row, self.volume, "volume")?,
            count: integer_field(row, self.count, "count")?,
        })
    }
}

fn price_field(row: &[Value], idx: usize, name: &str) -> Result<Decimal, ProviderError> {
    let value = row[idx].as_f64().ok_or_else(|| {
        ProviderError::SchemaMismatch(format!("field '{}' is not numeric: {}", name, row[idx]))
    })?;
    Decimal::try_from(value)
        .map_err(|e| ProviderError::InvalidResponse(format!("field '{}': {}", name, e)))
}

fn integer_field(row: &[Value], idx: usize, name: &str) -> Result<i64, ProviderError> {
    row[idx]
        .as_i64()
        .or_else(|| {
            row[idx]
                .as_f64()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
        })
        .ok_or_else(|| {
            ProviderError::SchemaMismatch(format!("field '{}' is not an integer: {}", name, row[idx]))
        })
}

/// Parse a `YYYYMMDD` integer date.
pub fn parse_date_int(value: i64) -> Option<NaiveDate> {
    let year = i32::try_from(value / 10_000).ok()?;
    let month = ((value / 100) % 100) as u32;
    let day = (value % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a date as the terminal's `YYYYMMDD` query value.
pub fn format_date(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

/// Convert a terminal strike (thousandths) to dollars.
pub fn strike_from_raw(raw: i64) -> Decimal {
    Decimal::new(raw, STRIKE_SCALE).normalize()
}

/// Convert a dollar strike to the terminal's thousandths.
pub fn strike_to_raw(strike: Decimal) -> Option<i64> {
    (strike * Decimal::from(1000)).round().to_i64()
}

/// Theta Terminal client.
pub struct ThetaDataClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    connected: bool,
    last_request: Instant,
    request_count: u64,
}

impl ThetaDataClient {
    /// Create a client for a terminal at `base_url`.
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            connected: false,
            last_request: Instant::now() - MIN_REQUEST_INTERVAL,
            request_count: 0,
        }
    }

    /// Get request count for monitoring.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    async fn send(&mut self, endpoint: &str, params: &[(&str, &str)]) -> Result<reqwest::Response, ProviderError> {
        let elapsed = self.last_request.elapsed();
        if elapsed < MIN_REQUEST_INTERVAL {
            tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
        }

        let url = format!("{}/v2/{}", self.base_url, endpoint);
        let mut request = self.client.get(&url).query(params);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(credentials.password()));
        }

        let response = request.send().await?;

        self.last_request = Instant::now();
        self.request_count += 1;

        Ok(response)
    }

    /// Rate-limited JSON request helper.
    async fn request<T: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, ProviderError> {
        if !self.connected {
            return Err(ProviderError::NotConnected);
        }

        let response = self.send(endpoint, params).await?;
        let status = response.status();

        if status.as_u16() == NO_DATA_STATUS {
            let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            return Err(ProviderError::NoData(format!("{}?{}", endpoint, query.join("&"))));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{}: {}", status, text)));
        }

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        if let Some(error) = body.header.error() {
            return Err(ProviderError::Api(error));
        }

        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for ThetaDataClient {
    async fn connect(&mut self) -> Result<(), ProviderError> {
        let response = self.send("system/mdds/status", &[]).await?;
        let status = response.text().await?;

        if status.trim() != "CONNECTED" {
            return Err(ProviderError::Api(format!(
                "terminal is not connected to market data (status: {})",
                status.trim()
            )));
        }

        self.connected = true;
        info!("Connected to Theta Terminal at {}", self.base_url);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            info!(
                "Closing Theta Terminal session after {} requests",
                self.request_count
            );
        }
        self.connected = false;
    }

    async fn list_expirations(&mut self, ticker: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        let body: ApiResponse<Vec<i64>> =
            self.request("list/expirations", &[("root", ticker)]).await?;

        body.response
            .into_iter()
            .map(|raw| {
                parse_date_int(raw).ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("invalid expiration {}", raw))
                })
            })
            .collect()
    }

    async fn list_strikes(
        &mut self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<Vec<Decimal>, ProviderError> {
        let exp = format_date(expiration);
        let body: ApiResponse<Vec<i64>> = self
            .request("list/strikes", &[("root", ticker), ("exp", exp.as_str())])
            .await?;

        Ok(body.response.into_iter().map(strike_from_raw).collect())
    }

    async fn price_series(
        &mut self,
        contract: &Contract,
        window: DateWindow,
    ) -> Result<PriceSeries, ProviderError> {
        let strike = strike_to_raw(contract.strike)
            .ok_or_else(|| ProviderError::Api(format!("strike out of range: {}", contract.strike)))?
            .to_string();
        let exp = format_date(contract.expiration);
        let start = format_date(window.start);
        let end = format_date(window.end);

        let params = [
            ("root", contract.ticker.as_str()),
            ("exp", exp.as_str()),
            ("strike", strike.as_str()),
            ("right", contract.right.as_str()),
            ("start_date", start.as_str()),
            ("end_date", end.as_str()),
        ];

        let body: ApiResponse<Vec<Vec<Value>>> = self.request("hist/option/eod", &params).await?;

        let format = body.header.format.as_deref().ok_or_else(|| {
            ProviderError::SchemaMismatch("response header has no row format".to_string())
        })?;
        let schema = BarSchema::from_format(format)?;

        let bars = body
            .response
            .iter()
            .map(|row| schema.parse_row(row))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Fetched {} bars for {}", bars.len(), contract);

        Ok(PriceSeries::new(contract.clone(), bars)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn eod_format() -> Vec<String> {
        [
            "ms_of_day", "ms_of_day2", "open", "high", "low", "close", "volume", "count",
            "bid_size", "bid", "ask_size", "ask", "date",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[test]
    fn test_schema_resolves_by_name() {
        let schema = BarSchema::from_format(&eod_format()).unwrap();
        let row = vec![
            json!(0),
            json!(0),
            json!(1.1),
            json!(1.4),
            json!(1.0),
            json!(1.25),
            json!(320),
            json!(17),
            json!(5),
            json!(1.2),
            json!(7),
            json!(1.3),
            json!(20230315),
        ];

        let bar = schema.parse_row(&row).unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
        assert_eq!(bar.open, dec!(1.1));
        assert_eq!(bar.close, dec!(1.25));
        assert_eq!(bar.volume, 320);
        assert_eq!(bar.count, 17);
    }

    #[test]
    fn test_schema_missing_field_fails_fast() {
        let format: Vec<String> = eod_format().into_iter().filter(|f| f != "volume").collect();
        match BarSchema::from_format(&format) {
            Err(ProviderError::SchemaMismatch(msg)) => assert!(msg.contains("volume")),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_rejects_short_rows() {
        let schema = BarSchema::from_format(&eod_format()).unwrap();
        let row = vec![json!(1.0), json!(2.0), json!(20230315)];
        assert!(matches!(
            schema.parse_row(&row),
            Err(ProviderError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_fractional_volume_rejected() {
        let schema = BarSchema::from_format(&eod_format()).unwrap();
        let mut row = vec![json!(0); 13];
        row[2] = json!(1.1);
        row[3] = json!(1.4);
        row[4] = json!(1.0);
        row[5] = json!(1.25);
        row[7] = json!(17);
        row[12] = json!(20230315);

        row[6] = json!(320.0);
        assert_eq!(schema.parse_row(&row).unwrap().volume, 320);

        row[6] = json!(320.5);
        match schema.parse_row(&row) {
            Err(ProviderError::SchemaMismatch(msg)) => assert!(msg.contains("volume")),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_all_bar_fields_required() {
        let format: Vec<String> = BAR_FIELDS.iter().map(|s| s.to_string()).collect();
        assert!(BarSchema::from_format(&format).is_ok());
    }

    #[test]
    fn test_date_encoding() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 2).unwrap();
        assert_eq!(format_date(date), "20230602");
        assert_eq!(parse_date_int(20230602), Some(date));
        assert_eq!(parse_date_int(20231345), None);
    }

    #[test]
    fn test_strike_scaling() {
        assert_eq!(strike_from_raw(100_000), dec!(100));
        assert_eq!(strike_from_raw(62_500), dec!(62.5));
        assert_eq!(strike_to_raw(dec!(62.5)), Some(62_500));
    }

    #[test]
    fn test_header_error_detection() {
        let ok = ResponseHeader {
            error_type: Some("null".to_string()),
            ..Default::default()
        };
        assert!(ok.error().is_none());

        let failed = ResponseHeader {
            error_type: Some("NO_PERMISSION".to_string()),
            error_msg: Some("subscription required".to_string()),
            ..Default::default()
        };
        assert_eq!(failed.error().unwrap(), "NO_PERMISSION: subscription required");
    }

    #[tokio::test]
    async fn test_requests_require_connection() {
        let mut client = ThetaDataClient::new(DEFAULT_BASE_URL, None);
        let result = client.list_expirations("BMY").await;
        assert!(matches!(result, Err(ProviderError::NotConnected)));
        assert_eq!(client.request_count(), 0);
    }
}
