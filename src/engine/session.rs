use crate::domain::{Decimal, NewTransaction, Position, PricePoint, Side, TransactionRecord};
use serde::Serialize;
use tracing::{debug, info};

use super::clock::{ClockState, ReplayClock, Tick};
use super::ledger::PositionLedger;
use super::series::{LoadState, PriceSeriesStore};
use super::SessionError;

/// Parameters that shape one simulation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub initial_window: usize,
    pub trade_quantity: Decimal,
    pub initial_balance: Decimal,
    pub pair: String,
}

/// The mutating command currently waiting on the persistence service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCommand {
    Open(Side),
    Close,
    Reset,
}

/// A prepared closing trade and the P&L it locks in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub body: NewTransaction,
    pub realized_pnl: Decimal,
}

/// Which commands are currently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub can_start: bool,
    pub can_stop: bool,
    pub can_open: bool,
    pub can_close: bool,
    pub can_reset: bool,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: ClockState,
    #[serde(rename = "loading_state")]
    pub load_state: LoadState,
    pub cursor: usize,
    pub series_len: usize,
    pub pair: String,
    pub trade_quantity: Decimal,
    pub current_rate: Option<Decimal>,
    pub position: Option<Position>,
    pub floating_pnl: Option<Decimal>,
    pub balance: Decimal,
    pub realized_pnl: Decimal,
    pub request_in_flight: Option<PendingCommand>,
    pub controls: Controls,
}

/// All mutable state of one simulation session.
///
/// Network round trips are split into `begin_*` (precondition checks and
/// request body) and `complete_*` (apply the confirmed response), so state is
/// only ever installed from what the persistence service returned.
#[derive(Debug, Clone)]
pub struct SessionState {
    config: SessionConfig,
    series: PriceSeriesStore,
    clock: ReplayClock,
    ledger: PositionLedger,
    current_rate: Option<Decimal>,
    balance: Decimal,
    realized_pnl: Decimal,
    history: Vec<TransactionRecord>,
    history_epoch: u64,
    in_flight: Option<PendingCommand>,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            series: PriceSeriesStore::new(config.initial_window),
            clock: ReplayClock::new(config.initial_window),
            ledger: PositionLedger::new(),
            current_rate: None,
            balance: config.initial_balance,
            realized_pnl: Decimal::zero(),
            history: Vec::new(),
            history_epoch: 0,
            in_flight: None,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the price series and rewind the replay to the initial window.
    pub fn load_series(&mut self, points: Vec<PricePoint>) -> Result<(), SessionError> {
        self.ensure_idle_request()?;
        self.ledger.ensure_flat()?;
        let loaded = self.series.load(points);
        self.clock.rewind(&mut self.series);
        self.current_rate = self.series.initial_rate();
        match &loaded {
            Ok(()) => info!(
                points = self.series.len(),
                window = self.series.initial_window(),
                "price series loaded"
            ),
            Err(e) => info!("price series not usable: {}", e),
        }
        loaded
    }

    // =========================================================================
    // Replay clock
    // =========================================================================

    pub fn start_clock(&mut self) -> Result<bool, SessionError> {
        let started = self.clock.start(&self.series)?;
        if started {
            info!(cursor = self.clock.cursor(), "replay started");
        }
        Ok(started)
    }

    pub fn stop_clock(&mut self) -> bool {
        let stopped = self.clock.stop();
        if stopped {
            info!(cursor = self.clock.cursor(), "replay stopped");
        }
        stopped
    }

    pub fn tick(&mut self) -> Tick {
        let tick = self.clock.tick(&mut self.series);
        match &tick {
            Tick::Advanced(point) => {
                self.current_rate = Some(point.close);
                debug!(cursor = self.clock.cursor(), date = %point.date, rate = %point.close, "tick");
            }
            Tick::Halted => info!(cursor = self.clock.cursor(), "replay reached end of series"),
            Tick::Skipped => {}
        }
        tick
    }

    /// Rewind the replay to the initial window. Only allowed while flat.
    pub fn reset_replay(&mut self) -> Result<(), SessionError> {
        self.ensure_idle_request()?;
        self.ledger.ensure_flat()?;
        self.rewind();
        Ok(())
    }

    fn rewind(&mut self) {
        self.clock.rewind(&mut self.series);
        self.current_rate = self.series.initial_rate();
    }

    // =========================================================================
    // Trade commands
    // =========================================================================

    fn ensure_idle_request(&self) -> Result<(), SessionError> {
        match self.in_flight {
            Some(_) => Err(SessionError::RequestInFlight),
            None => Ok(()),
        }
    }

    fn ensure_running(&self) -> Result<Decimal, SessionError> {
        if !self.clock.is_running() {
            return Err(SessionError::ClockNotRunning);
        }
        self.current_rate.ok_or(SessionError::ClockNotRunning)
    }

    /// Check open preconditions and build the opening trade request.
    pub fn begin_open(&mut self, side: Side) -> Result<NewTransaction, SessionError> {
        self.ensure_idle_request()?;
        self.ledger.ensure_flat()?;
        let rate = self.ensure_running()?;

        self.in_flight = Some(PendingCommand::Open(side));
        Ok(NewTransaction {
            pair: self.config.pair.clone(),
            trade_type: side.opening_trade_type(),
            quantity: self.config.trade_quantity,
            price: rate,
            realized_profit: None,
            opening_trade_id: None,
        })
    }

    pub fn complete_open(&mut self, record: &TransactionRecord) -> Result<Position, SessionError> {
        let position = self.ledger.install(record)?.clone();
        info!(
            side = %position.side,
            quantity = %position.quantity,
            entry = %position.entry_price,
            trade_id = %position.opening_trade_id,
            "position opened"
        );
        Ok(position)
    }

    /// Check close preconditions, lock in the realized P&L at the current
    /// rate and build the closing trade request.
    pub fn begin_close(&mut self) -> Result<CloseRequest, SessionError> {
        self.ensure_idle_request()?;
        let position = self.ledger.ensure_open()?.clone();
        let rate = self.ensure_running()?;

        let realized_pnl = position
            .floating_pnl(rate)
            .ok_or(SessionError::PnlOutOfRange)?;
        self.in_flight = Some(PendingCommand::Close);
        Ok(CloseRequest {
            body: NewTransaction {
                pair: self.config.pair.clone(),
                trade_type: position.side.closing_trade_type(),
                quantity: position.quantity,
                price: rate,
                realized_profit: Some(realized_pnl),
                opening_trade_id: Some(position.opening_trade_id),
            },
            realized_pnl,
        })
    }

    /// Clear the position and book the realized P&L into the balance.
    ///
    /// The profit echoed by the service wins over the locally computed one.
    pub fn complete_close(
        &mut self,
        record: &TransactionRecord,
        requested: Decimal,
    ) -> Result<Decimal, SessionError> {
        self.ledger.ensure_open()?;
        let realized = record.realized_profit.unwrap_or(requested);
        let (balance, total) = match (
            self.balance.checked_add(realized),
            self.realized_pnl.checked_add(realized),
        ) {
            (Some(balance), Some(total)) => (balance, total),
            _ => {
                return Err(SessionError::InvalidConfirmation(format!(
                    "closing trade {} profit {} is out of range",
                    record.id, realized
                )))
            }
        };
        let position = self.ledger.clear().ok_or(SessionError::NoOpenPosition)?;
        self.balance = balance;
        self.realized_pnl = total;
        info!(
            side = %position.side,
            exit = %record.price,
            realized = %realized,
            balance = %self.balance,
            "position closed"
        );
        Ok(realized)
    }

    /// Stop the clock and mark a session reset as outstanding.
    pub fn begin_reset(&mut self) -> Result<(), SessionError> {
        self.ensure_idle_request()?;
        self.stop_clock();
        self.in_flight = Some(PendingCommand::Reset);
        Ok(())
    }

    /// Return everything to the initial state of the session.
    pub fn complete_reset(&mut self) {
        self.ledger.clear();
        self.balance = self.config.initial_balance;
        self.realized_pnl = Decimal::zero();
        self.history.clear();
        self.history_epoch += 1;
        self.rewind();
        info!(balance = %self.balance, "session reset");
    }

    /// Release the outstanding-request slot, whatever the outcome.
    pub fn finish_request(&mut self) {
        self.in_flight = None;
    }

    /// Bumped on every session reset; a history fetch started before a reset
    /// must not repopulate the cleared cache.
    pub fn history_epoch(&self) -> u64 {
        self.history_epoch
    }

    /// Replace the cached history if no reset happened since `epoch`.
    pub fn replace_history(&mut self, epoch: u64, records: Vec<TransactionRecord>) -> bool {
        if epoch != self.history_epoch {
            return false;
        }
        self.history = records;
        true
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn cursor(&self) -> usize {
        self.clock.cursor()
    }

    pub fn load_state(&self) -> LoadState {
        self.series.load_state()
    }

    pub fn revealed_prefix(&self) -> &[PricePoint] {
        self.series.revealed_prefix()
    }

    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    pub fn position(&self) -> Option<&Position> {
        self.ledger.position()
    }

    pub fn current_rate(&self) -> Option<Decimal> {
        self.current_rate
    }

    pub fn floating_pnl(&self) -> Option<Decimal> {
        self.current_rate
            .and_then(|rate| self.ledger.floating_pnl(rate))
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn in_flight(&self) -> Option<PendingCommand> {
        self.in_flight
    }

    pub fn controls(&self) -> Controls {
        let idle_request = self.in_flight.is_none();
        let running = self.clock.is_running();
        Controls {
            can_start: self.clock.can_start(&self.series),
            can_stop: running,
            can_open: running && idle_request && !self.ledger.is_open(),
            can_close: running && idle_request && self.ledger.is_open(),
            can_reset: idle_request,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.clock.state(),
            load_state: self.series.load_state(),
            cursor: self.clock.cursor(),
            series_len: self.series.len(),
            pair: self.config.pair.clone(),
            trade_quantity: self.config.trade_quantity,
            current_rate: self.current_rate,
            position: self.ledger.position().cloned(),
            floating_pnl: self.floating_pnl(),
            balance: self.balance,
            realized_pnl: self.realized_pnl,
            request_in_flight: self.in_flight,
            controls: self.controls(),
        }
    }
}
