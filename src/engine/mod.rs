//! Pure, synchronous simulation core.
//!
//! Nothing in here performs I/O or awaits; the orchestration layer drives it
//! and performs the network round trips in between `begin_*` and `complete_*`.

use thiserror::Error;

pub mod clock;
pub mod ledger;
pub mod series;
pub mod session;

pub use clock::{ClockState, ReplayClock, Tick};
pub use ledger::PositionLedger;
pub use series::{LoadState, PriceSeriesStore};
pub use session::{
    CloseRequest, Controls, PendingCommand, SessionConfig, SessionSnapshot, SessionState,
};

/// Rejections raised locally, before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("insufficient price data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },
    #[error("price series is not strictly ascending at index {index}")]
    OutOfOrder { index: usize },
    #[error("a position is already open")]
    PositionAlreadyOpen,
    #[error("no open position")]
    NoOpenPosition,
    #[error("replay clock is not running")]
    ClockNotRunning,
    #[error("another request is still in flight")]
    RequestInFlight,
    #[error("position P&L is out of range")]
    PnlOutOfRange,
    #[error("invalid confirmation from persistence service: {0}")]
    InvalidConfirmation(String),
}
