//! Open position and floating P&L.

use crate::domain::{Decimal, Side, TradeId};
use serde::{Deserialize, Serialize};

/// The single open speculative position.
///
/// Only ever built from a server-confirmed opening record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub opening_trade_id: TradeId,
}

impl Position {
    /// Unrealized P&L at `rate`, or `None` if it does not fit in a `Decimal`.
    ///
    /// The distance is signed by side: a Short gains exactly what a Long
    /// loses for the same move.
    pub fn floating_pnl(&self, rate: Decimal) -> Option<Decimal> {
        let distance = match self.side {
            Side::Long => rate.checked_sub(self.entry_price)?,
            Side::Short => self.entry_price.checked_sub(rate)?,
        };
        distance.checked_mul(self.quantity)
    }
}
