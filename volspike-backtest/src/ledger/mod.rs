//! Transaction log: the flagged events for one expiration and their
//! persisted tabular form.

pub mod log;
pub mod transaction;

pub use log::{LedgerError, TransactionLog, COLUMNS};
pub use transaction::{Transaction, TransactionType};
