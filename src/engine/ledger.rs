use crate::domain::{Decimal, Position, TransactionRecord};

use super::SessionError;

/// Single-slot holder for the open position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionLedger {
    slot: Option<Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn position(&self) -> Option<&Position> {
        self.slot.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_some()
    }

    pub fn ensure_flat(&self) -> Result<(), SessionError> {
        match self.slot {
            Some(_) => Err(SessionError::PositionAlreadyOpen),
            None => Ok(()),
        }
    }

    pub fn ensure_open(&self) -> Result<&Position, SessionError> {
        self.slot.as_ref().ok_or(SessionError::NoOpenPosition)
    }

    /// Install a position from the server-confirmed opening record.
    ///
    /// Side, quantity and entry price come from the record, not from the
    /// request that produced it.
    pub fn install(&mut self, record: &TransactionRecord) -> Result<&Position, SessionError> {
        self.ensure_flat()?;
        if !record.quantity.is_positive() {
            return Err(SessionError::InvalidConfirmation(format!(
                "opening trade {} has non-positive quantity {}",
                record.id, record.quantity
            )));
        }
        if record.quantity.checked_mul(record.price).is_none() {
            return Err(SessionError::InvalidConfirmation(format!(
                "opening trade {} notional {} x {} is out of range",
                record.id, record.quantity, record.price
            )));
        }
        if record.is_closing() {
            return Err(SessionError::InvalidConfirmation(format!(
                "trade {} references opening trade and cannot open a position",
                record.id
            )));
        }

        let position = self.slot.insert(Position {
            side: record.trade_type.opened_side(),
            quantity: record.quantity,
            entry_price: record.price,
            opening_trade_id: record.id,
        });
        Ok(&*position)
    }

    pub fn clear(&mut self) -> Option<Position> {
        self.slot.take()
    }

    /// Floating P&L of the open position at `rate`; `None` when flat or out of range.
    pub fn floating_pnl(&self, rate: Decimal) -> Option<Decimal> {
        self.slot.as_ref().and_then(|p| p.floating_pnl(rate))
    }
}
