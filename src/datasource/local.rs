//! Embedded transaction store backed by SQLite.

use super::{DataSourceError, TransactionStore};
use crate::db::Repository;
use crate::domain::{NewTransaction, TransactionRecord};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Page size used when listing history, matching the remote service default.
pub const HISTORY_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct LocalStore {
    repo: Arc<Repository>,
}

impl LocalStore {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionStore for LocalStore {
    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, DataSourceError> {
        Ok(self.repo.list_transactions(0, HISTORY_LIMIT).await?)
    }

    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionRecord, DataSourceError> {
        Ok(self.repo.insert_transaction(transaction).await?)
    }

    async fn clear_transactions(&self) -> Result<(), DataSourceError> {
        let removed = self.repo.delete_all().await?;
        tracing::debug!("Cleared {} stored transactions", removed);
        Ok(())
    }
}
