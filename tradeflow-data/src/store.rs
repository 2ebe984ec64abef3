//! Optional durable copy of the trade stream.
//!
//! Best-effort: insert failures are logged by the caller and never block the
//! in-memory path. When selected at startup the store can also serve as the
//! aggregation [`TradeSource`] instead of the in-memory buffer.

use crate::{
    error::StoreError,
    report::TradeSource,
    trade::{Side, Trade},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::{path::Path, str::FromStr};
use tracing::{error, info};

/// Tag written into every row identifying where the trade came from.
const FEED_SOURCE: &str = "bybit-ws";

pub struct RemoteStore {
    conn: Mutex<Connection>,
    symbol: String,
}

impl RemoteStore {
    pub fn open(path: impl AsRef<Path>, symbol: impl Into<String>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?, symbol.into())
    }

    /// Ephemeral store for tests.
    pub fn open_in_memory(symbol: impl Into<String>) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, symbol.into())
    }

    fn init(conn: Connection, symbol: String) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                side TEXT NOT NULL,
                qty TEXT NOT NULL,
                price TEXT NOT NULL,
                symbol TEXT NOT NULL,
                source TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trades_symbol_ts ON trades(symbol, ts DESC)",
            [],
        )?;
        info!(symbol = %symbol, "trade store initialised");
        Ok(Self {
            conn: Mutex::new(conn),
            symbol,
        })
    }

    /// Insert one trade. Quantity and price are stored as text to keep the
    /// decimal representation exact.
    pub fn insert(&self, trade: &Trade) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO trades (ts, side, qty, price, symbol, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                trade.occurred_at.timestamp_millis(),
                trade.side.as_str(),
                trade.quantity.to_string(),
                trade.price.to_string(),
                self.symbol,
                FEED_SOURCE,
            ],
        )?;
        Ok(())
    }

    /// All stored trades for this symbol with `occurred_at > cutoff`, in
    /// insertion order.
    pub fn query_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Trade>, StoreError> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(
            "SELECT ts, side, qty, price FROM trades
             WHERE symbol = ?1 AND ts > ?2 ORDER BY id",
        )?;
        let rows = statement.query_map(
            params![self.symbol, cutoff.timestamp_millis()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?;

        let mut trades = Vec::new();
        for row in rows {
            let (ts, side, qty, price) = row?;
            trades.push(Trade {
                occurred_at: DateTime::from_timestamp_millis(ts)
                    .ok_or_else(|| StoreError::Corrupt(format!("timestamp {ts}")))?,
                side: Side::from_str(&side).map_err(StoreError::Corrupt)?,
                quantity: Decimal::from_str(&qty)
                    .map_err(|_| StoreError::Corrupt(format!("quantity {qty}")))?,
                price: Decimal::from_str(&price)
                    .map_err(|_| StoreError::Corrupt(format!("price {price}")))?,
            });
        }
        Ok(trades)
    }
}

impl TradeSource for RemoteStore {
    fn trades_since(&self, cutoff: DateTime<Utc>) -> Vec<Trade> {
        match self.query_since(cutoff) {
            Ok(trades) => trades,
            Err(e) => {
                error!(error = %e, "trade store query failed, reporting on empty window");
                Vec::new()
            }
        }
    }
}
