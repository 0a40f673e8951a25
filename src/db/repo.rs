//! Repository for the `transactions` table.

use crate::domain::{Decimal, NewTransaction, TradeId, TradeType, TransactionRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

const SELECT_COLUMNS: &str =
    "SELECT id, pair, trade_type, amount, price, timestamp, profit, opening_trade_id FROM transactions";

pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Insert a transaction and return the stored row with its assigned id
    /// and timestamp.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<TransactionRecord, sqlx::Error> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                pair, trade_type, amount, price, timestamp, profit, opening_trade_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.pair)
        .bind(transaction.trade_type.as_str())
        .bind(transaction.quantity.to_canonical_string())
        .bind(transaction.price.to_canonical_string())
        .bind(timestamp.to_rfc3339())
        .bind(transaction.realized_profit.map(|p| p.to_canonical_string()))
        .bind(transaction.opening_trade_id.map(|id| id.as_i64()))
        .execute(&self.pool)
        .await?;

        self.get_transaction(TradeId::new(result.last_insert_rowid()))
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_transaction(&self, id: TradeId) -> Result<Option<TransactionRecord>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Page through transactions, most recent first.
    pub async fn list_transactions(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY id DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Delete every transaction. Returns the number of rows removed.
    pub async fn delete_all(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    fn decimal(raw: &str) -> Result<Decimal, sqlx::Error> {
        Decimal::from_str_canonical(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    let trade_type: String = row.try_get("trade_type")?;
    let trade_type = trade_type
        .parse::<TradeType>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;

    let timestamp: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    let profit: Option<String> = row.try_get("profit")?;
    let opening_trade_id: Option<i64> = row.try_get("opening_trade_id")?;

    Ok(TransactionRecord {
        id: TradeId::new(row.try_get("id")?),
        pair: row.try_get("pair")?,
        trade_type,
        quantity: decimal(&row.try_get::<String, _>("amount")?)?,
        price: decimal(&row.try_get::<String, _>("price")?)?,
        timestamp,
        realized_profit: profit.as_deref().map(decimal).transpose()?,
        opening_trade_id: opening_trade_id.map(TradeId::new),
    })
}
