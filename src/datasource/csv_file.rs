//! Daily series read from a local CSV file, for offline replay.

use super::{DataSourceError, PriceSource};
use crate::domain::{Decimal, PricePoint};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

/// Reads `time,open,high,low,close` rows, one trading day per row.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse_csv(csv_bytes: &[u8]) -> Result<Vec<PricePoint>, DataSourceError> {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            time: String,
            open: String,
            high: String,
            low: String,
            close: String,
        }

        fn price(field: &str, value: &str) -> Result<Decimal, DataSourceError> {
            Decimal::from_str_canonical(value.trim())
                .map_err(|e| DataSourceError::ParseError(format!("invalid {}: {}", field, e)))
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_bytes);

        let mut points = Vec::new();
        for record in reader.deserialize::<Row>() {
            let row = record.map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            let date = NaiveDate::parse_from_str(&row.time, "%Y-%m-%d").map_err(|e| {
                DataSourceError::ParseError(format!("invalid time {}: {}", row.time, e))
            })?;

            points.push(PricePoint::new(
                date,
                price("open", &row.open)?,
                price("high", &row.high)?,
                price("low", &row.low)?,
                price("close", &row.close)?,
            ));
        }

        Ok(points)
    }
}

#[async_trait]
impl PriceSource for CsvPriceSource {
    async fn fetch_daily_chart(&self) -> Result<Vec<PricePoint>, DataSourceError> {
        debug!("Reading daily chart from {}", self.path.display());
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| DataSourceError::Other(format!("{}: {}", self.path.display(), e)))?;
        Self::parse_csv(&bytes)
    }
}
