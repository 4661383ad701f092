//! Trading decisions recorded by the signal generator.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionRight;

/// Side of a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    /// Call anomalies buy, put anomalies sell.
    pub fn from_right(right: OptionRight) -> Self {
        match right {
            OptionRight::Call => Self::Buy,
            OptionRight::Put => Self::Sell,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged event, as persisted in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_date: NaiveDate,
    pub ticker: String,
    pub strike: Decimal,
    pub exp_date: NaiveDate,
    pub transaction_type: TransactionType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_to_action() {
        assert_eq!(TransactionType::from_right(OptionRight::Call), TransactionType::Buy);
        assert_eq!(TransactionType::from_right(OptionRight::Put), TransactionType::Sell);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!(TransactionType::from_str("BUY"), Some(TransactionType::Buy));
        assert_eq!(TransactionType::from_str(" sell "), Some(TransactionType::Sell));
        assert_eq!(TransactionType::from_str("HOLD"), None);
        assert_eq!(TransactionType::Sell.to_string(), "SELL");
    }
}
