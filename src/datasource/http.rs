//! REST client for the persistence and price service.

use super::{DataSourceError, PriceSource, TransactionStore};
use crate::domain::{NewTransaction, PricePoint, TransactionRecord};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const DEFAULT_RETRY_BUDGET: Duration = Duration::from_secs(30);

/// Client for `GET /daily-chart` and the `/transactions` resource.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    retry_budget: Duration,
}

impl HttpBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Bound the total time spent retrying idempotent calls.
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an idempotent request, retrying transport errors, 429 and 5xx.
    async fn send_idempotent(&self, method: Method, path: &str) -> Result<Response, DataSourceError> {
        let url = self.url(path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        debug!("{} {}", method, url);
        retry(backoff, || async {
            let response = self
                .client
                .request(method.clone(), &url)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }
            Ok(response)
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DataSourceError> {
        self.send_idempotent(Method::GET, path)
            .await?
            .json::<T>()
            .await
            .map_err(|e| DataSourceError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PriceSource for HttpBackend {
    async fn fetch_daily_chart(&self) -> Result<Vec<PricePoint>, DataSourceError> {
        self.get_json("/daily-chart").await
    }
}

#[async_trait]
impl TransactionStore for HttpBackend {
    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, DataSourceError> {
        self.get_json("/transactions").await
    }

    /// Creating a trade is not idempotent, so it is attempted exactly once.
    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionRecord, DataSourceError> {
        let url = self.url("/transactions");
        debug!(
            "POST {} trade_type={} price={}",
            url, transaction.trade_type, transaction.price
        );

        let response = self
            .client
            .post(&url)
            .json(transaction)
            .send()
            .await
            .map_err(|e| DataSourceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Failed to create transaction".to_string(),
            });
        }

        response
            .json::<TransactionRecord>()
            .await
            .map_err(|e| DataSourceError::ParseError(e.to_string()))
    }

    async fn clear_transactions(&self) -> Result<(), DataSourceError> {
        self.send_idempotent(Method::DELETE, "/transactions")
            .await
            .map(|_| ())
    }
}
