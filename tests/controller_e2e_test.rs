use chrono::NaiveDate;
use fxreplay::datasource::{DataSourceError, MockBackend};
use fxreplay::engine::{ClockState, PendingCommand, SessionConfig, SessionError};
use fxreplay::{Decimal, PricePoint, Side, TradeController, TradeError, TradeType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_test::{assert_err, assert_ok};

const WINDOW: usize = 4000;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

/// `WINDOW` flat points at 149.000 followed by `tail`.
fn series_with_tail(tail: &[&str]) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    let closes = std::iter::repeat("149.000")
        .take(WINDOW)
        .chain(tail.iter().copied());
    closes
        .enumerate()
        .map(|(i, c)| {
            let px = d(c);
            PricePoint::new(start + chrono::Duration::days(i as i64), px, px, px, px)
        })
        .collect()
}

fn standard_series() -> Vec<PricePoint> {
    series_with_tail(&["150.000", "150.100", "150.200", "150.300", "150.400"])
}

fn controller(mock: &MockBackend) -> Arc<TradeController> {
    Arc::new(TradeController::new(
        SessionConfig {
            initial_window: WINDOW,
            trade_quantity: Decimal::from_units(10_000),
            initial_balance: Decimal::from_units(1_000_000),
            pair: "USD/JPY".to_string(),
        },
        Duration::from_secs(1),
        Arc::new(mock.clone()),
        Arc::new(mock.clone()),
    ))
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_long_round_trip_books_realized_profit() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    assert_ok!(ctl.initialize(true).await);

    let snap = ctl.snapshot();
    assert_eq!(snap.state, ClockState::Running);
    assert_eq!(snap.cursor, WINDOW);
    assert_eq!(snap.current_rate, Some(d("149.000")));

    sleep_ms(1500).await;
    assert_eq!(ctl.snapshot().current_rate, Some(d("150.000")));

    let position = assert_ok!(ctl.open(Side::Long).await);
    assert_eq!(position.side, Side::Long);
    assert_eq!(position.entry_price, d("150.000"));
    assert_eq!(position.quantity, Decimal::from_units(10_000));

    sleep_ms(3000).await;
    let snap = ctl.snapshot();
    assert_eq!(snap.current_rate, Some(d("150.300")));
    assert_eq!(snap.floating_pnl, Some(Decimal::from_units(3000)));

    let realized = assert_ok!(ctl.close().await);
    assert_eq!(realized, Decimal::from_units(3000));

    let snap = ctl.snapshot();
    assert!(snap.position.is_none());
    assert_eq!(snap.floating_pnl, None);
    assert_eq!(snap.balance, Decimal::from_units(1_003_000));
    assert_eq!(snap.realized_pnl, Decimal::from_units(3000));

    let records = mock.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].trade_type, TradeType::Ask);
    assert_eq!(records[0].realized_profit, None);
    assert_eq!(records[1].trade_type, TradeType::Bid);
    assert_eq!(records[1].realized_profit, Some(Decimal::from_units(3000)));
    assert_eq!(records[1].opening_trade_id, Some(records[0].id));
    assert_eq!(records[1].price, d("150.300"));

    // The cached history is refreshed after each confirmed trade.
    let history = ctl.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, records[1].id);
}

#[tokio::test(start_paused = true)]
async fn test_short_loss_reduces_balance() {
    let mock = MockBackend::new().with_series(series_with_tail(&["150.000", "150.050", "150.060"]));
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();

    sleep_ms(1500).await;
    ctl.open(Side::Short).await.unwrap();
    sleep_ms(1000).await;
    assert_eq!(ctl.snapshot().floating_pnl, Some(d("-500")));

    let realized = ctl.close().await.unwrap();
    assert_eq!(realized, d("-500"));
    assert_eq!(ctl.snapshot().balance, Decimal::from_units(999_500));
}

#[tokio::test(start_paused = true)]
async fn test_replay_auto_stops_at_end_of_series() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();

    sleep_ms(5500).await;
    let snap = ctl.snapshot();
    assert_eq!(snap.state, ClockState::Idle);
    assert_eq!(snap.cursor, 4004);
    assert_eq!(snap.current_rate, Some(d("150.300")));
    assert_eq!(ctl.revealed_prefix().len(), 4004);
    assert!(!snap.controls.can_start);

    // Nothing else arrives once the series is exhausted.
    sleep_ms(5000).await;
    assert_eq!(ctl.snapshot().cursor, 4004);
    assert_eq!(ctl.ticker_cancellations(), 0);
    assert!(!ctl.stop());
}

#[tokio::test(start_paused = true)]
async fn test_stop_twice_cancels_once() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    assert!(ctl.stop());
    assert!(!ctl.stop());
    assert_eq!(ctl.snapshot().state, ClockState::Idle);
    assert_eq!(ctl.ticker_cancellations(), 1);

    let cursor = ctl.snapshot().cursor;
    sleep_ms(3000).await;
    assert_eq!(ctl.snapshot().cursor, cursor);

    // Starting twice only spawns one tick source.
    assert!(ctl.start().unwrap());
    assert!(!ctl.start().unwrap());
    sleep_ms(1500).await;
    assert_eq!(ctl.snapshot().cursor, cursor + 1);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_open_makes_no_network_call() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    ctl.open(Side::Long).await.unwrap();
    assert_eq!(mock.create_calls(), 1);

    let err = assert_err!(ctl.open(Side::Short).await);
    assert!(matches!(err, TradeError::Session(SessionError::PositionAlreadyOpen)));
    assert_eq!(mock.create_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trading_rejected_while_clock_idle() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(false).await.unwrap();

    assert!(matches!(
        ctl.open(Side::Long).await,
        Err(TradeError::Session(SessionError::ClockNotRunning))
    ));
    assert!(matches!(
        ctl.close().await,
        Err(TradeError::Session(SessionError::NoOpenPosition))
    ));
    assert_eq!(mock.create_calls(), 0);

    ctl.start().unwrap();
    sleep_ms(1500).await;
    ctl.open(Side::Long).await.unwrap();
    ctl.stop();
    assert!(matches!(
        ctl.close().await,
        Err(TradeError::Session(SessionError::ClockNotRunning))
    ));
    assert_eq!(mock.create_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_command_rejected_while_request_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let mock = MockBackend::new()
        .with_series(standard_series())
        .with_create_gate(gate.clone());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    let pending = {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.open(Side::Long).await })
    };
    for _ in 0..100 {
        if ctl.snapshot().request_in_flight.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let snap = ctl.snapshot();
    assert_eq!(snap.request_in_flight, Some(PendingCommand::Open(Side::Long)));
    assert!(!snap.controls.can_open);
    assert!(!snap.controls.can_close);
    assert!(snap.position.is_none());

    assert!(matches!(
        ctl.open(Side::Short).await,
        Err(TradeError::Session(SessionError::RequestInFlight))
    ));
    assert!(matches!(
        ctl.reset_history().await,
        Err(TradeError::Session(SessionError::RequestInFlight))
    ));
    assert_eq!(mock.create_calls(), 1);
    assert_eq!(mock.clear_calls(), 0);

    gate.add_permits(1);
    let position = pending.await.unwrap().unwrap();
    assert_eq!(position.side, Side::Long);
    assert_eq!(ctl.snapshot().request_in_flight, None);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_caller_still_applies_confirmed_open() {
    let gate = Arc::new(Semaphore::new(0));
    let mock = MockBackend::new()
        .with_series(standard_series())
        .with_create_gate(gate.clone());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    let pending = {
        let ctl = ctl.clone();
        tokio::spawn(async move { ctl.open(Side::Long).await })
    };
    for _ in 0..100 {
        if mock.create_calls() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    // The store has not answered, so the slot stays taken.
    assert_eq!(
        ctl.snapshot().request_in_flight,
        Some(PendingCommand::Open(Side::Long))
    );
    assert!(matches!(
        ctl.open(Side::Short).await,
        Err(TradeError::Session(SessionError::RequestInFlight))
    ));

    gate.add_permits(1);
    for _ in 0..100 {
        if ctl.snapshot().request_in_flight.is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let snap = ctl.snapshot();
    assert_eq!(snap.request_in_flight, None);
    let position = snap.position.expect("confirmed open was applied");
    assert_eq!(position.side, Side::Long);
    assert_eq!(position.entry_price, d("150.000"));

    assert!(matches!(
        ctl.open(Side::Short).await,
        Err(TradeError::Session(SessionError::PositionAlreadyOpen))
    ));
    assert_eq!(mock.create_calls(), 1);
    assert_eq!(mock.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_leaves_state_unchanged() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    mock.fail_creates(true);
    let before = ctl.snapshot();
    let err = assert_err!(ctl.open(Side::Long).await);
    assert!(matches!(
        err,
        TradeError::PersistenceCallFailed(DataSourceError::HttpError { status: 500, .. })
    ));
    let after = ctl.snapshot();
    assert!(after.position.is_none());
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.request_in_flight, None);

    // The same action can be retried once the service recovers.
    mock.fail_creates(false);
    ctl.open(Side::Long).await.unwrap();

    mock.fail_creates(true);
    sleep_ms(1000).await;
    assert!(ctl.close().await.is_err());
    let snap = ctl.snapshot();
    assert!(snap.position.is_some());
    assert_eq!(snap.balance, Decimal::from_units(1_000_000));
    assert_eq!(snap.realized_pnl, Decimal::zero());
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_fill_price_wins() {
    let mock = MockBackend::new()
        .with_series(standard_series())
        .with_fill_price(d("150.002"));
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    let position = ctl.open(Side::Long).await.unwrap();
    assert_eq!(position.entry_price, d("150.002"));
    assert_eq!(ctl.snapshot().floating_pnl, Some(d("-20")));
}

#[tokio::test(start_paused = true)]
async fn test_reset_history_restores_initial_session() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;

    ctl.open(Side::Long).await.unwrap();
    sleep_ms(1000).await;
    ctl.close().await.unwrap();
    ctl.open(Side::Short).await.unwrap();
    assert_ne!(ctl.snapshot().balance, Decimal::from_units(1_000_000));

    ctl.reset_history().await.unwrap();
    let snap = ctl.snapshot();
    assert_eq!(snap.state, ClockState::Idle);
    assert_eq!(snap.cursor, WINDOW);
    assert_eq!(snap.current_rate, Some(d("149.000")));
    assert!(snap.position.is_none());
    assert_eq!(snap.floating_pnl, None);
    assert_eq!(snap.balance, Decimal::from_units(1_000_000));
    assert_eq!(snap.realized_pnl, Decimal::zero());
    assert!(ctl.history().is_empty());
    assert!(mock.records().is_empty());
    assert_eq!(ctl.revealed_prefix().len(), WINDOW);
    assert_eq!(ctl.ticker_cancellations(), 1);

    // The clock stays stopped until started again.
    sleep_ms(3000).await;
    assert_eq!(ctl.snapshot().cursor, WINDOW);
    assert!(ctl.start().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reset_only_stops_clock() {
    let mock = MockBackend::new().with_series(standard_series());
    let ctl = controller(&mock);
    ctl.initialize(true).await.unwrap();
    sleep_ms(1500).await;
    ctl.open(Side::Long).await.unwrap();

    mock.fail_clears(true);
    assert!(matches!(
        ctl.reset_history().await,
        Err(TradeError::PersistenceCallFailed(_))
    ));

    let snap = ctl.snapshot();
    assert_eq!(snap.state, ClockState::Idle);
    assert!(snap.position.is_some());
    assert_eq!(snap.cursor, WINDOW + 1);
    assert_eq!(ctl.history().len(), 1);
    assert_eq!(snap.request_in_flight, None);
}

#[tokio::test(start_paused = true)]
async fn test_short_series_never_starts() {
    let mut points = standard_series();
    points.truncate(WINDOW - 1);
    let mock = MockBackend::new().with_series(points);
    let ctl = controller(&mock);

    let err = assert_err!(ctl.initialize(true).await);
    assert!(matches!(
        err,
        TradeError::Session(SessionError::InsufficientData {
            required: WINDOW,
            available: 3999
        })
    ));
    assert_eq!(ctl.snapshot().state, ClockState::Idle);
    assert!(ctl.start().is_err());
}
