//! Domain primitives: TradeId, Side, TradeType.

use serde::{Deserialize, Serialize};

/// Identifier issued by the persistence service for a stored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub i64);

impl TradeId {
    pub fn new(id: i64) -> Self {
        TradeId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directional bias of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profits when the rate rises.
    Long,
    /// Profits when the rate falls.
    Short,
}

impl Side {
    /// Trade type recorded when a position on this side is opened.
    pub fn opening_trade_type(&self) -> TradeType {
        match self {
            Side::Long => TradeType::Ask,
            Side::Short => TradeType::Bid,
        }
    }

    /// Trade type recorded when a position on this side is closed.
    pub fn closing_trade_type(&self) -> TradeType {
        self.opening_trade_type().opposite()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Trade type as stored by the persistence service.
///
/// `ASK` is a buy at the offered rate, `BID` a sell. The legacy `buy`/`sell`
/// spellings are still accepted when reading records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    #[serde(rename = "ASK", alias = "buy")]
    Ask,
    #[serde(rename = "BID", alias = "sell")]
    Bid,
}

impl TradeType {
    pub fn opposite(&self) -> TradeType {
        match self {
            TradeType::Ask => TradeType::Bid,
            TradeType::Bid => TradeType::Ask,
        }
    }

    /// Side of the position this trade type opens.
    pub fn opened_side(&self) -> Side {
        match self {
            TradeType::Ask => Side::Long,
            TradeType::Bid => Side::Short,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Ask => "ASK",
            TradeType::Bid => "BID",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASK" | "buy" => Ok(TradeType::Ask),
            "BID" | "sell" => Ok(TradeType::Bid),
            other => Err(format!("unknown trade type: {}", other)),
        }
    }
}
