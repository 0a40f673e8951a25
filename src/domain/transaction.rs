//! Transaction records exchanged with the persistence service.

use crate::domain::{Decimal, TradeId, TradeType};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A server-confirmed transaction. The engine only caches these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TradeId,
    pub pair: String,
    pub trade_type: TradeType,
    #[serde(rename = "amount")]
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Realized P&L, present on closing trades only.
    #[serde(rename = "profit", default)]
    pub realized_profit: Option<Decimal>,
    /// Back-reference from a closing trade to the trade it closed.
    #[serde(default)]
    pub opening_trade_id: Option<TradeId>,
}

impl TransactionRecord {
    pub fn is_closing(&self) -> bool {
        self.opening_trade_id.is_some()
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.f]` read as UTC. Stores
/// without timezone support return the latter.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Request body for `POST /transactions`.
///
/// Price and quantity here are provisional; the created record is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub pair: String,
    pub trade_type: TradeType,
    #[serde(rename = "amount")]
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(rename = "profit")]
    pub realized_profit: Option<Decimal>,
    pub opening_trade_id: Option<TradeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_closing_record() {
        let json = r#"{
            "id": 7,
            "pair": "USD/JPY",
            "trade_type": "BID",
            "amount": 10000.0,
            "price": 150.3,
            "timestamp": "2025-01-10T09:30:00.123456+00:00",
            "profit": 3000.0,
            "opening_trade_id": 6
        }"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, TradeId::new(7));
        assert_eq!(record.trade_type, TradeType::Bid);
        assert_eq!(record.quantity, Decimal::from_units(10_000));
        assert_eq!(record.realized_profit, Some(Decimal::from_units(3000)));
        assert!(record.is_closing());
    }

    #[test]
    fn test_parse_legacy_record_without_profit_fields() {
        let json = r#"{
            "id": 1,
            "pair": "USD_JPY",
            "trade_type": "buy",
            "amount": 10000,
            "price": 150.0,
            "timestamp": "2025-01-10T09:30:00Z"
        }"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.trade_type, TradeType::Ask);
        assert_eq!(record.realized_profit, None);
        assert!(!record.is_closing());
    }

    #[test]
    fn test_parse_naive_timestamp_as_utc() {
        let json = r#"{
            "id": 2,
            "pair": "USD/JPY",
            "trade_type": "ASK",
            "amount": 10000,
            "price": 150.0,
            "timestamp": "2025-01-10T09:30:00.123456"
        }"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.timestamp.to_rfc3339(),
            "2025-01-10T09:30:00.123456+00:00"
        );

        let spaced = json.replace("2025-01-10T09:30:00.123456", "2025-01-10 09:30:00");
        let record: TransactionRecord = serde_json::from_str(&spaced).unwrap();
        assert_eq!(record.timestamp.to_rfc3339(), "2025-01-10T09:30:00+00:00");

        let garbage = json.replace("2025-01-10T09:30:00.123456", "yesterday");
        assert!(serde_json::from_str::<TransactionRecord>(&garbage).is_err());
    }

    #[test]
    fn test_new_transaction_wire_names() {
        let body = NewTransaction {
            pair: "USD/JPY".to_string(),
            trade_type: TradeType::Ask,
            quantity: Decimal::from_units(10_000),
            price: Decimal::from_str_canonical("150.000").unwrap(),
            realized_profit: None,
            opening_trade_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["trade_type"], "ASK");
        assert_eq!(json["amount"], 10000.0);
        assert!(json["profit"].is_null());
        assert!(json["opening_trade_id"].is_null());
    }
}
