//! Async orchestration around the synchronous session core.

pub mod controller;

pub use controller::{TradeController, TradeError};
