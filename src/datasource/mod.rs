//! Collaborator seams: where price series come from and where trades are persisted.

use crate::domain::{NewTransaction, PricePoint, TransactionRecord};
use async_trait::async_trait;
use std::fmt;

pub mod csv_file;
pub mod http;
pub mod local;
pub mod mock;

pub use csv_file::CsvPriceSource;
pub use http::HttpBackend;
pub use local::LocalStore;
pub use mock::MockBackend;

/// Source of the historical daily series.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Fetch the full series, ordered ascending by date.
    async fn fetch_daily_chart(&self) -> Result<Vec<PricePoint>, DataSourceError>;
}

/// The ledger of record for opening and closing trades.
///
/// Every returned record is authoritative; callers install local state
/// from it, never from what they sent.
#[async_trait]
pub trait TransactionStore: Send + Sync + fmt::Debug {
    /// Fetch the stored history in the store's own order.
    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, DataSourceError>;

    /// Persist a trade and return the created record.
    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionRecord, DataSourceError>;

    /// Remove every stored trade.
    async fn clear_transactions(&self) -> Result<(), DataSourceError>;
}

/// Failure of a call to the price or persistence service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Transport failure (connection refused, timeout, DNS).
    NetworkError(String),
    /// Non-success HTTP status.
    HttpError { status: u16, message: String },
    /// Response body did not match the expected schema.
    ParseError(String),
    /// 429 from the service.
    RateLimited,
    /// Embedded store failure.
    Storage(String),
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Storage(msg) => write!(f, "Storage error: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

impl From<sqlx::Error> for DataSourceError {
    fn from(err: sqlx::Error) -> Self {
        DataSourceError::Storage(err.to_string())
    }
}
