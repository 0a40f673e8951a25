use crate::datasource::{DataSourceError, PriceSource, TransactionStore};
use crate::domain::{Decimal, Position, PricePoint, Side, TransactionRecord};
use crate::engine::{ClockState, SessionConfig, SessionError, SessionSnapshot, SessionState, Tick};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TradeError {
    #[error(transparent)]
    Session(SessionError),
    #[error("persistence call failed: {0}")]
    PersistenceCallFailed(#[from] DataSourceError),
    #[error("trade task did not complete: {0}")]
    TaskFailed(#[from] JoinError),
}

impl From<SessionError> for TradeError {
    fn from(err: SessionError) -> Self {
        match err {
            // A confirmation we cannot install is a bad response, not a local rejection.
            SessionError::InvalidConfirmation(msg) => {
                TradeError::PersistenceCallFailed(DataSourceError::ParseError(msg))
            }
            other => TradeError::Session(other),
        }
    }
}

struct Shared {
    session: SessionState,
    ticker: Option<JoinHandle<()>>,
    /// Bumped on every cancellation; a tick task whose generation is stale
    /// exits without touching the session.
    ticker_generation: u64,
    cancellations: u64,
    shut_down: bool,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn touch(&mut self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn cancel_ticker(&mut self) {
        self.ticker_generation += 1;
        if let Some(handle) = self.ticker.take() {
            handle.abort();
            self.cancellations += 1;
            debug!("tick task cancelled");
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the outstanding-request slot when dropped, including when the
/// persistence task panics.
struct InFlight {
    shared: Arc<Mutex<Shared>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut guard = lock(&self.shared);
        guard.session.finish_request();
        guard.touch();
    }
}

/// Drives a [`SessionState`] against the price source and the persistence
/// service.
///
/// The session lock is only ever held for synchronous work; network calls run
/// between a `begin_*` and a `complete_*` with the lock released.
pub struct TradeController {
    shared: Arc<Mutex<Shared>>,
    prices: Arc<dyn PriceSource>,
    store: Arc<dyn TransactionStore>,
    tick_interval: Duration,
}

impl TradeController {
    pub fn new(
        config: SessionConfig,
        tick_interval: Duration,
        prices: Arc<dyn PriceSource>,
        store: Arc<dyn TransactionStore>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                session: SessionState::new(config),
                ticker: None,
                ticker_generation: 0,
                cancellations: 0,
                shut_down: false,
                revision,
            })),
            prices,
            store,
            tick_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Load the series, fill the history cache and optionally start the replay.
    ///
    /// A history fetch failure is logged and does not fail the load.
    pub async fn initialize(&self, auto_start: bool) -> Result<(), TradeError> {
        let loaded = self.load_series().await;
        let _ = self.refresh_history().await;
        loaded?;
        if auto_start {
            self.start()?;
        }
        Ok(())
    }

    /// Fetch the daily chart and load it into the session.
    pub async fn load_series(&self) -> Result<(), TradeError> {
        let points = self.prices.fetch_daily_chart().await.map_err(|e| {
            warn!("daily chart fetch failed: {}", e);
            TradeError::PersistenceCallFailed(e)
        })?;

        let mut guard = self.lock();
        let loaded = guard.session.load_series(points);
        if guard.session.clock_state() == ClockState::Idle {
            guard.cancel_ticker();
        }
        guard.touch();
        loaded.map_err(TradeError::from)
    }

    /// Idle -> Running. Returns `Ok(false)` if nothing changed.
    pub fn start(&self) -> Result<bool, TradeError> {
        let mut guard = self.lock();
        if guard.shut_down || !guard.session.start_clock()? {
            return Ok(false);
        }
        guard.cancel_ticker();
        let generation = guard.ticker_generation;
        guard.ticker = Some(spawn_ticker(
            self.shared.clone(),
            self.tick_interval,
            generation,
        ));
        guard.touch();
        Ok(true)
    }

    /// Running -> Idle. Returns `false` when already idle.
    pub fn stop(&self) -> bool {
        let mut guard = self.lock();
        if !guard.session.stop_clock() {
            return false;
        }
        guard.cancel_ticker();
        guard.touch();
        true
    }

    /// Rewind the replay to the initial window. Rejected while a position is open.
    pub fn reset_replay(&self) -> Result<(), TradeError> {
        let mut guard = self.lock();
        guard.session.reset_replay()?;
        guard.cancel_ticker();
        guard.touch();
        Ok(())
    }

    /// Open a position on `side` once the store confirms the opening trade.
    ///
    /// The round trip runs in its own task: dropping the returned future does
    /// not abandon a trade the store may already have committed.
    pub async fn open(&self, side: Side) -> Result<Position, TradeError> {
        let (body, in_flight) = {
            let mut guard = self.lock();
            let body = guard.session.begin_open(side)?;
            guard.touch();
            (body, self.in_flight())
        };

        let shared = self.shared.clone();
        let store = self.store.clone();
        detached(async move {
            let applied = match store.create_transaction(&body).await {
                Ok(record) => {
                    let mut guard = lock(&shared);
                    let applied = guard.session.complete_open(&record);
                    guard.touch();
                    applied.map_err(TradeError::from)
                }
                Err(e) => Err(TradeError::PersistenceCallFailed(e)),
            };
            drop(in_flight);

            match applied {
                Ok(position) => {
                    let _ = refresh_history(&shared, store.as_ref()).await;
                    Ok(position)
                }
                Err(e) => {
                    warn!(%side, "open failed: {}", e);
                    Err(e)
                }
            }
        })
        .await
    }

    /// Close the open position and return the realized P&L booked to the balance.
    pub async fn close(&self) -> Result<Decimal, TradeError> {
        let (request, in_flight) = {
            let mut guard = self.lock();
            let request = guard.session.begin_close()?;
            guard.touch();
            (request, self.in_flight())
        };

        let shared = self.shared.clone();
        let store = self.store.clone();
        detached(async move {
            let applied = match store.create_transaction(&request.body).await {
                Ok(record) => {
                    let mut guard = lock(&shared);
                    let applied = guard.session.complete_close(&record, request.realized_pnl);
                    guard.touch();
                    applied.map_err(TradeError::from)
                }
                Err(e) => Err(TradeError::PersistenceCallFailed(e)),
            };
            drop(in_flight);

            match applied {
                Ok(realized) => {
                    let _ = refresh_history(&shared, store.as_ref()).await;
                    Ok(realized)
                }
                Err(e) => {
                    warn!("close failed: {}", e);
                    Err(e)
                }
            }
        })
        .await
    }

    /// Clear the stored history and return the session to its initial state.
    ///
    /// The clock is stopped before the delete is sent; if the delete fails the
    /// clock stays stopped and nothing else changes.
    pub async fn reset_history(&self) -> Result<(), TradeError> {
        let in_flight = {
            let mut guard = self.lock();
            guard.session.begin_reset()?;
            guard.cancel_ticker();
            guard.touch();
            self.in_flight()
        };

        let shared = self.shared.clone();
        let store = self.store.clone();
        detached(async move {
            let cleared = store.clear_transactions().await;
            if cleared.is_ok() {
                let mut guard = lock(&shared);
                guard.session.complete_reset();
                guard.touch();
            }
            drop(in_flight);

            cleared.map_err(|e| {
                warn!("history reset failed: {}", e);
                TradeError::PersistenceCallFailed(e)
            })
        })
        .await
    }

    /// Replace the cached history with the store's current contents.
    pub async fn refresh_history(&self) -> Result<(), TradeError> {
        refresh_history(&self.shared, self.store.as_ref()).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().session.snapshot()
    }

    pub fn revealed_prefix(&self) -> Vec<PricePoint> {
        self.lock().session.revealed_prefix().to_vec()
    }

    pub fn history(&self) -> Vec<TransactionRecord> {
        self.lock().session.history().to_vec()
    }

    /// Revision counter bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.lock().revision.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// How many times a running tick task has been cancelled.
    pub fn ticker_cancellations(&self) -> u64 {
        self.lock().cancellations
    }

    /// Stop the replay for good and wake subscribers so they can finish.
    pub fn shutdown(&self) {
        let mut guard = self.lock();
        guard.session.stop_clock();
        guard.cancel_ticker();
        guard.shut_down = true;
        guard.touch();
        info!("controller shut down");
    }

    fn in_flight(&self) -> InFlight {
        InFlight {
            shared: self.shared.clone(),
        }
    }
}

impl Drop for TradeController {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.shared).ticker.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for TradeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeController")
            .field("prices", &self.prices)
            .field("store", &self.store)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}

/// Run a persistence round trip to completion even if the caller goes away.
async fn detached<T, F>(task: F) -> Result<T, TradeError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, TradeError>> + Send + 'static,
{
    tokio::spawn(task).await?
}

async fn refresh_history(
    shared: &Mutex<Shared>,
    store: &dyn TransactionStore,
) -> Result<(), TradeError> {
    let epoch = lock(shared).session.history_epoch();
    let records = store.list_transactions().await.map_err(|e| {
        warn!("history refresh failed: {}", e);
        TradeError::PersistenceCallFailed(e)
    })?;

    let mut guard = lock(shared);
    if guard.session.replace_history(epoch, records) {
        guard.touch();
    } else {
        debug!("discarding history fetched before a reset");
    }
    Ok(())
}

fn spawn_ticker(shared: Arc<Mutex<Shared>>, period: Duration, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let keep_going = {
                let mut guard = lock(&shared);
                // Cancelled while waiting for the lock.
                if guard.ticker_generation != generation {
                    break;
                }
                match guard.session.tick() {
                    Tick::Advanced(_) => {
                        guard.touch();
                        true
                    }
                    Tick::Halted => {
                        // Exhausted: drop our own handle so stop() has nothing to cancel.
                        guard.ticker = None;
                        guard.touch();
                        false
                    }
                    Tick::Skipped => false,
                }
            };
            if !keep_going {
                break;
            }
        }
    })
}
