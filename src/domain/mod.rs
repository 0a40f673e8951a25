//! Domain types for the FX replay simulator.
//!
//! - Lossless numeric handling via the `Decimal` wrapper
//! - Primitives: `TradeId`, `Side`, `TradeType`
//! - `PricePoint`, `Position`, and the transaction wire types

pub mod decimal;
pub mod position;
pub mod price;
pub mod primitives;
pub mod transaction;

pub use decimal::Decimal;
pub use position::Position;
pub use price::PricePoint;
pub use primitives::{Side, TradeId, TradeType};
pub use transaction::{NewTransaction, TransactionRecord};
