//! In-memory backend for tests: serves a fixed series, stores trades, counts
//! calls and can be told to fail or to hold requests.

use super::{DataSourceError, PriceSource, TransactionStore};
use crate::domain::{Decimal, NewTransaction, PricePoint, TradeId, TransactionRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct Calls {
    chart: AtomicUsize,
    list: AtomicUsize,
    create: AtomicUsize,
    clear: AtomicUsize,
}

#[derive(Debug, Default)]
struct Failures {
    chart: AtomicBool,
    list: AtomicBool,
    create: AtomicBool,
    clear: AtomicBool,
}

#[derive(Debug, Default)]
struct Stored {
    records: Vec<TransactionRecord>,
    next_id: i64,
}

/// Mock price source and transaction store.
///
/// Clones share the same stored records, counters and failure switches.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    series: Vec<PricePoint>,
    fill_price: Option<Decimal>,
    create_gate: Option<Arc<Semaphore>>,
    stored: Arc<Mutex<Stored>>,
    calls: Arc<Calls>,
    failures: Arc<Failures>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this series from `fetch_daily_chart`.
    pub fn with_series(mut self, series: Vec<PricePoint>) -> Self {
        self.series = series;
        self
    }

    /// Confirm every trade at this price instead of the requested one.
    pub fn with_fill_price(mut self, price: Decimal) -> Self {
        self.fill_price = Some(price);
        self
    }

    /// Make each `create_transaction` wait for a permit on `gate`.
    pub fn with_create_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.create_gate = Some(gate);
        self
    }

    pub fn fail_chart(&self, fail: bool) {
        self.failures.chart.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.failures.list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.failures.create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_clears(&self, fail: bool) {
        self.failures.clear.store(fail, Ordering::SeqCst);
    }

    pub fn chart_calls(&self) -> usize {
        self.calls.chart.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.calls.create.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.calls.clear.load(Ordering::SeqCst)
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.stored().records.clone()
    }

    fn stored(&self) -> MutexGuard<'_, Stored> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injected(flag: &AtomicBool) -> Result<(), DataSourceError> {
        if flag.load(Ordering::SeqCst) {
            return Err(DataSourceError::HttpError {
                status: 500,
                message: "Injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PriceSource for MockBackend {
    async fn fetch_daily_chart(&self) -> Result<Vec<PricePoint>, DataSourceError> {
        self.calls.chart.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.failures.chart)?;
        Ok(self.series.clone())
    }
}

#[async_trait]
impl TransactionStore for MockBackend {
    async fn list_transactions(&self) -> Result<Vec<TransactionRecord>, DataSourceError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.failures.list)?;
        Ok(self.stored().records.iter().rev().cloned().collect())
    }

    async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionRecord, DataSourceError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.create_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| DataSourceError::Other(e.to_string()))?;
            permit.forget();
        }
        Self::injected(&self.failures.create)?;

        let mut stored = self.stored();
        stored.next_id += 1;
        let record = TransactionRecord {
            id: TradeId::new(stored.next_id),
            pair: transaction.pair.clone(),
            trade_type: transaction.trade_type,
            quantity: transaction.quantity,
            price: self.fill_price.unwrap_or(transaction.price),
            timestamp: Utc::now(),
            realized_profit: transaction.realized_profit,
            opening_trade_id: transaction.opening_trade_id,
        };
        stored.records.push(record.clone());
        Ok(record)
    }

    async fn clear_transactions(&self) -> Result<(), DataSourceError> {
        self.calls.clear.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.failures.clear)?;
        self.stored().records.clear();
        Ok(())
    }
}
