//! Transaction log for one ticker and expiration, and its CSV form.
//!
//! The persisted table has exactly these columns, in order:
//! - transaction_date, ticker, strike, exp_date, transaction_type
//!
//! Dates are written as `YYYY-MM-DD`. On load, every column is read as text
//! and parsed explicitly; columns outside the schema (such as an index column
//! left by other tools) are dropped, and rows are sorted by transaction date.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use polars::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use super::transaction::{Transaction, TransactionType};

/// Persisted columns, in order.
pub const COLUMNS: &[&str] = &[
    "transaction_date",
    "ticker",
    "strike",
    "exp_date",
    "transaction_type",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Row {row}: invalid {column} '{value}'")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Transactions for one (ticker, expiration) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLog {
    ticker: String,
    expiration: NaiveDate,
    transactions: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new(ticker: &str, expiration: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            expiration,
            transactions: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn expiration(&self) -> NaiveDate {
        self.expiration
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Stable sort by transaction date.
    pub fn sort_by_date(&mut self) {
        self.transactions.sort_by_key(|t| t.transaction_date);
    }

    /// Distinct strikes, ascending.
    pub fn strikes(&self) -> Vec<Decimal> {
        self.transactions
            .iter()
            .map(|t| t.strike.normalize())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Transactions at one strike, in log order.
    pub fn for_strike(&self, strike: Decimal) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |t| t.strike == strike)
    }

    pub fn count_of(&self, kind: TransactionType) -> usize {
        self.transactions
            .iter()
            .filter(|t| t.transaction_type == kind)
            .count()
    }

    /// Default file name for a persisted log.
    pub fn file_name(ticker: &str, expiration: NaiveDate) -> String {
        format!("transactions_{}_{}.csv", ticker, expiration.format(DATE_FORMAT))
    }

    /// Path of this log's file inside `dir`.
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(Self::file_name(&self.ticker, self.expiration))
    }

    /// Convert to a DataFrame with the persisted column layout.
    pub fn to_dataframe(&self) -> Result<DataFrame, LedgerError> {
        let n = self.transactions.len();
        let mut transaction_date: Vec<String> = Vec::with_capacity(n);
        let mut ticker: Vec<&str> = Vec::with_capacity(n);
        let mut strike: Vec<String> = Vec::with_capacity(n);
        let mut exp_date: Vec<String> = Vec::with_capacity(n);
        let mut transaction_type: Vec<&str> = Vec::with_capacity(n);

        for t in &self.transactions {
            transaction_date.push(t.transaction_date.format(DATE_FORMAT).to_string());
            ticker.push(&t.ticker);
            strike.push(t.strike.normalize().to_string());
            exp_date.push(t.exp_date.format(DATE_FORMAT).to_string());
            transaction_type.push(t.transaction_type.as_str());
        }

        let df = DataFrame::new(vec![
            Series::new("transaction_date".into(), transaction_date).into(),
            Series::new("ticker".into(), ticker).into(),
            Series::new("strike".into(), strike).into(),
            Series::new("exp_date".into(), exp_date).into(),
            Series::new("transaction_type".into(), transaction_type).into(),
        ])?;

        Ok(df)
    }

    /// Build a log from a DataFrame, validating the schema and sorting by date.
    pub fn from_dataframe(
        df: &DataFrame,
        ticker: &str,
        expiration: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let missing: Vec<&str> = COLUMNS
            .iter()
            .copied()
            .filter(|name| df.column(name).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::SchemaMismatch(format!(
                "missing columns {:?}",
                missing
            )));
        }

        let artifacts: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| !COLUMNS.contains(&name.as_str()))
            .map(|name| name.to_string())
            .collect();
        if !artifacts.is_empty() {
            debug!("Dropping storage columns {:?}", artifacts);
        }

        let dates = text_column(df, "transaction_date")?;
        let tickers = text_column(df, "ticker")?;
        let strikes = text_column(df, "strike")?;
        let exp_dates = text_column(df, "exp_date")?;
        let types = text_column(df, "transaction_type")?;

        let mut log = Self::new(ticker, expiration);

        for row in 0..df.height() {
            let transaction_date = parse_date(&dates[row])
                .ok_or_else(|| invalid(row, "transaction_date", &dates[row]))?;
            let row_ticker = tickers[row]
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| invalid(row, "ticker", &tickers[row]))?;
            let strike = strikes[row]
                .as_deref()
                .and_then(|s| Decimal::from_str(s.trim()).ok())
                .ok_or_else(|| invalid(row, "strike", &strikes[row]))?;
            let exp_date =
                parse_date(&exp_dates[row]).ok_or_else(|| invalid(row, "exp_date", &exp_dates[row]))?;
            let transaction_type = types[row]
                .as_deref()
                .and_then(TransactionType::from_str)
                .ok_or_else(|| invalid(row, "transaction_type", &types[row]))?;

            log.push(Transaction {
                transaction_date,
                ticker: row_ticker.to_string(),
                strike: strike.normalize(),
                exp_date,
                transaction_type,
            });
        }

        log.sort_by_date();
        Ok(log)
    }

    /// Write the log as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut df = self.to_dataframe()?;
        let mut file = fs::File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;

        debug!("Wrote {} transactions to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a persisted log back, sorted by transaction date.
    pub fn read_csv(path: &Path, ticker: &str, expiration: NaiveDate) -> Result<Self, LedgerError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        Self::from_dataframe(&df, ticker, expiration)
    }
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, LedgerError> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time of day.
fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    let text = value.as_deref()?.trim();
    let date_part = text.split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

fn invalid(row: usize, column: &'static str, value: &Option<String>) -> LedgerError {
    LedgerError::InvalidField {
        row,
        column,
        value: value.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, month, day).unwrap()
    }

    fn txn(month: u32, day: u32, strike: Decimal, kind: TransactionType) -> Transaction {
        Transaction {
            transaction_date: date(month, day),
            ticker: "BMY".to_string(),
            strike,
            exp_date: date(6, 16),
            transaction_type: kind,
        }
    }

    fn tuples(log: &TransactionLog) -> Vec<(NaiveDate, Decimal, TransactionType)> {
        log.transactions()
            .iter()
            .map(|t| (t.transaction_date, t.strike, t.transaction_type))
            .collect()
    }

    #[test]
    fn test_dataframe_layout() {
        let mut log = TransactionLog::new("BMY", date(6, 16));
        log.push(txn(4, 3, dec!(62.5), TransactionType::Buy));

        let df = log.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, COLUMNS);
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_csv_round_trip_sorts_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TransactionLog::new("BMY", date(6, 16));
        log.push(txn(5, 2, dec!(65), TransactionType::Sell));
        log.push(txn(3, 20, dec!(62.5), TransactionType::Buy));
        log.push(txn(4, 11, dec!(65), TransactionType::Buy));

        let path = log.path_in(dir.path());
        log.write_csv(&path).unwrap();
        let loaded = TransactionLog::read_csv(&path, "BMY", date(6, 16)).unwrap();

        let mut expected = log.clone();
        expected.sort_by_date();
        assert_eq!(tuples(&loaded), tuples(&expected));
        assert_eq!(loaded.transactions()[0].transaction_date, date(3, 20));
        assert_eq!(loaded.transactions()[0].ticker, "BMY");
        assert_eq!(loaded.transactions()[0].exp_date, date(6, 16));
    }

    #[test]
    fn test_round_trip_independent_of_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let items = [
            txn(3, 1, dec!(100), TransactionType::Buy),
            txn(3, 8, dec!(105), TransactionType::Sell),
            txn(3, 15, dec!(100), TransactionType::Sell),
        ];

        let mut forward = TransactionLog::new("X", date(6, 16));
        let mut backward = TransactionLog::new("X", date(6, 16));
        for t in items.iter() {
            forward.push(t.clone());
        }
        for t in items.iter().rev() {
            backward.push(t.clone());
        }

        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        forward.write_csv(&a).unwrap();
        backward.write_csv(&b).unwrap();

        let a = TransactionLog::read_csv(&a, "X", date(6, 16)).unwrap();
        let b = TransactionLog::read_csv(&b, "X", date(6, 16)).unwrap();
        assert_eq!(tuples(&a), tuples(&b));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_empty_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::new("BMY", date(6, 16));
        let path = dir.path().join("nested").join("empty.csv");

        log.write_csv(&path).unwrap();
        let loaded = TransactionLog::read_csv(&path, "BMY", date(6, 16)).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.strikes().is_empty());
    }

    #[test]
    fn test_storage_columns_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(
            &path,
            "Unnamed: 0,transaction_date,ticker,strike,exp_date,transaction_type\n\
             0,2023-04-03,BMY,65.0,2023-06-16,SELL\n\
             1,2023-03-21,BMY,62.5,2023-06-16,BUY\n",
        )
        .unwrap();

        let log = TransactionLog::read_csv(&path, "BMY", date(6, 16)).unwrap();
        assert_eq!(
            tuples(&log),
            vec![
                (date(3, 21), dec!(62.5), TransactionType::Buy),
                (date(4, 3), dec!(65), TransactionType::Sell),
            ]
        );
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "transaction_date,ticker,strike\n2023-04-03,BMY,65\n").unwrap();

        match TransactionLog::read_csv(&path, "BMY", date(6, 16)) {
            Err(LedgerError::SchemaMismatch(msg)) => {
                assert!(msg.contains("exp_date"));
                assert!(msg.contains("transaction_type"));
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_field_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "transaction_date,ticker,strike,exp_date,transaction_type\n\
             2023-04-03,BMY,65,2023-06-16,BUY\n\
             2023-04-04,BMY,65,2023-06-16,HOLD\n",
        )
        .unwrap();

        match TransactionLog::read_csv(&path, "BMY", date(6, 16)) {
            Err(LedgerError::InvalidField { row, column, value }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "transaction_type");
                assert_eq!(value, "HOLD");
            }
            other => panic!("expected invalid field, got {:?}", other),
        }
    }

    #[test]
    fn test_strikes_are_distinct_and_sorted() {
        let mut log = TransactionLog::new("BMY", date(6, 16));
        log.push(txn(3, 1, dec!(70), TransactionType::Buy));
        log.push(txn(3, 2, dec!(65.0), TransactionType::Sell));
        log.push(txn(3, 3, dec!(65), TransactionType::Buy));

        assert_eq!(log.strikes(), vec![dec!(65), dec!(70)]);
        assert_eq!(log.for_strike(dec!(65)).count(), 2);
        assert_eq!(log.count_of(TransactionType::Buy), 2);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            TransactionLog::file_name("BMY", date(6, 16)),
            "transactions_BMY_2023-06-16.csv"
        );
    }
}
