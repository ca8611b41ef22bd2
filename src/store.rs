//! Read-only access to the bot's SQLite database.
//!
//! Every query returns typed records; a column the bot never populated shows
//! up as `None`, never as a silent default. Logical tables: `ml_models`,
//! `paper_trades`, `price_data`, `ml_features`, `ml_predictions`,
//! `arbitrage_opportunities`, `ml_model_history`. All timestamps are unix
//! epoch seconds.

use anyhow::Result;
use rusqlite::{params, Connection, OpenFlags};

use crate::context::{v_str, RunContext};

/// Why a query produced no records.
///
/// `SourceMissing` is the bot simply not having that table/column yet — an
/// expected condition, mapped to a `Missing` check status. `Query` is an
/// unrecoverable sqlite error, mapped to `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    SourceMissing(String),
    Query(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::SourceMissing(m) => write!(f, "source missing: {}", m),
            StoreError::Query(m) => write!(f, "query error: {}", m),
        }
    }
}

fn classify(e: rusqlite::Error) -> StoreError {
    let msg = e.to_string();
    if msg.contains("no such table") || msg.contains("no such column") {
        StoreError::SourceMissing(msg)
    } else {
        StoreError::Query(msg)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub name: String,
    pub model_type: Option<String>,
    pub accuracy: Option<f64>,
    pub confidence_threshold: Option<f64>,
    pub is_active: bool,
    pub last_trained: Option<i64>,
    pub training_samples: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub ts: i64,
    pub symbol: String,
    pub exchange: Option<String>,
    pub profit: Option<f64>,
    pub confidence: Option<f64>,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
}

impl TradeRecord {
    /// Mid-price reconstructed from the paired buy/sell legs, when both exist.
    pub fn paired_mid(&self) -> Option<f64> {
        match (self.buy_price, self.sell_price) {
            (Some(b), Some(s)) => Some((b + s) / 2.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceRecord {
    pub ts: i64,
    pub exchange: String,
    pub symbol: String,
    pub mid_price: Option<f64>,
    pub spread_pct: Option<f64>,
    pub volume_24h: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ThresholdChange {
    pub model: String,
    pub confidence_threshold: f64,
    pub updated_at: i64,
}

pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    /// Open the bot database read-only. The audit never writes.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    /// Open read-only, degrading to an empty in-memory database when the
    /// file cannot be opened. Every source then reads as missing and the
    /// audit still completes with a zero score.
    pub fn open_or_empty(path: &str, ctx: &RunContext) -> Result<Self> {
        match Self::open(path) {
            Ok(store) => Ok(store),
            Err(e) => {
                ctx.log(
                    "store",
                    &[
                        ("event", v_str("open_failed")),
                        ("path", v_str(path)),
                        ("error", v_str(&e.to_string())),
                        ("fallback", v_str("empty_in_memory")),
                    ],
                );
                Ok(Self { conn: Connection::open_in_memory()? })
            }
        }
    }

    /// Wrap an existing connection (embedding, fixtures).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn models(&self) -> Result<Vec<ModelRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, model_type, accuracy, confidence_threshold,
                        is_active, last_trained, training_samples
                 FROM ml_models ORDER BY name",
            )
            .map_err(classify)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ModelRecord {
                    name: row.get(0)?,
                    model_type: row.get(1)?,
                    accuracy: row.get(2)?,
                    confidence_threshold: row.get(3)?,
                    is_active: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
                    last_trained: row.get(5)?,
                    training_samples: row.get(6)?,
                })
            })
            .map_err(classify)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;
        Ok(rows)
    }

    pub fn prices_since(&self, since: i64) -> Result<Vec<PriceRecord>, StoreError> {
        self.price_query(
            "SELECT ts, exchange, symbol, mid_price, spread_pct, volume_24h
             FROM price_data WHERE ts > ?1 ORDER BY ts DESC",
            params![since],
        )
    }

    pub fn prices_for_symbol_since(
        &self,
        symbol: &str,
        since: i64,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        self.price_query(
            "SELECT ts, exchange, symbol, mid_price, spread_pct, volume_24h
             FROM price_data WHERE symbol = ?1 AND ts > ?2 ORDER BY ts DESC",
            params![symbol, since],
        )
    }

    fn price_query(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(PriceRecord {
                    ts: row.get(0)?,
                    exchange: row.get(1)?,
                    symbol: row.get(2)?,
                    mid_price: row.get(3)?,
                    spread_pct: row.get(4)?,
                    volume_24h: row.get(5)?,
                })
            })
            .map_err(classify)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;
        Ok(rows)
    }

    pub fn trades_since(&self, since: i64) -> Result<Vec<TradeRecord>, StoreError> {
        self.trade_query(
            "SELECT ts, symbol, exchange, profit, confidence_score, buy_price, sell_price
             FROM paper_trades WHERE ts > ?1 ORDER BY ts DESC",
            params![since],
        )
    }

    pub fn trades_for_symbol_since(
        &self,
        symbol: &str,
        since: i64,
    ) -> Result<Vec<TradeRecord>, StoreError> {
        self.trade_query(
            "SELECT ts, symbol, exchange, profit, confidence_score, buy_price, sell_price
             FROM paper_trades WHERE symbol = ?1 AND ts > ?2 ORDER BY ts DESC",
            params![symbol, since],
        )
    }

    pub fn trades_with_confidence_since(
        &self,
        since: i64,
    ) -> Result<Vec<TradeRecord>, StoreError> {
        self.trade_query(
            "SELECT ts, symbol, exchange, profit, confidence_score, buy_price, sell_price
             FROM paper_trades
             WHERE confidence_score IS NOT NULL AND ts > ?1 ORDER BY ts DESC",
            params![since],
        )
    }

    fn trade_query(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TradeRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(TradeRecord {
                    ts: row.get(0)?,
                    symbol: row.get(1)?,
                    exchange: row.get(2)?,
                    profit: row.get(3)?,
                    confidence: row.get(4)?,
                    buy_price: row.get(5)?,
                    sell_price: row.get(6)?,
                })
            })
            .map_err(classify)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;
        Ok(rows)
    }

    /// Row count and newest timestamp for the dedicated feature table.
    pub fn feature_rows_since(&self, since: i64) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest("SELECT COUNT(*), MAX(ts) FROM ml_features WHERE ts > ?1", since)
    }

    /// Fallback feature signal: opportunity records carrying derived columns.
    pub fn opportunity_feature_rows_since(
        &self,
        since: i64,
    ) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest(
            "SELECT COUNT(*), MAX(ts) FROM arbitrage_opportunities
             WHERE ts > ?1 AND (spread_pct IS NOT NULL OR volume_24h IS NOT NULL)",
            since,
        )
    }

    pub fn prediction_rows_since(&self, since: i64) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest("SELECT COUNT(*), MAX(ts) FROM ml_predictions WHERE ts > ?1", since)
    }

    /// Fallback prediction signal: trades tagged with a confidence score.
    pub fn confident_trade_rows_since(
        &self,
        since: i64,
    ) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest(
            "SELECT COUNT(*), MAX(ts) FROM paper_trades
             WHERE ts > ?1 AND confidence_score IS NOT NULL",
            since,
        )
    }

    pub fn price_rows_since(&self, since: i64) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest("SELECT COUNT(*), MAX(ts) FROM price_data WHERE ts > ?1", since)
    }

    pub fn trade_rows_since(&self, since: i64) -> Result<(u64, Option<i64>), StoreError> {
        self.count_and_latest("SELECT COUNT(*), MAX(ts) FROM paper_trades WHERE ts > ?1", since)
    }

    pub fn threshold_history_since(
        &self,
        since: i64,
    ) -> Result<Vec<ThresholdChange>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, confidence_threshold, updated_at
                 FROM ml_model_history
                 WHERE updated_at > ?1 AND confidence_threshold IS NOT NULL
                 ORDER BY updated_at",
            )
            .map_err(classify)?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok(ThresholdChange {
                    model: row.get(0)?,
                    confidence_threshold: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })
            .map_err(classify)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;
        Ok(rows)
    }

    fn count_and_latest(&self, sql: &str, since: i64) -> Result<(u64, Option<i64>), StoreError> {
        self.conn
            .query_row(sql, params![since], |row| {
                Ok((row.get::<_, i64>(0)? as u64, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_store() -> AuditStore {
        AuditStore::from_connection(Connection::open_in_memory().unwrap())
    }

    #[test]
    fn missing_table_classifies_as_source_missing() {
        let store = empty_store();
        match store.models() {
            Err(StoreError::SourceMissing(_)) => {}
            other => panic!("expected SourceMissing, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn typed_rows_preserve_absent_fields() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ml_models (
                name TEXT, model_type TEXT, accuracy REAL,
                confidence_threshold REAL, is_active INTEGER,
                last_trained INTEGER, training_samples INTEGER
            );
            INSERT INTO ml_models VALUES ('gbt', NULL, 0.71, 0.65, 1, 1000, 5000);
            INSERT INTO ml_models VALUES ('lstm', 'sequence', NULL, NULL, 0, NULL, NULL);",
        )
        .unwrap();
        let store = AuditStore::from_connection(conn);
        let models = store.models().unwrap();
        assert_eq!(models.len(), 2);
        let gbt = models.iter().find(|m| m.name == "gbt").unwrap();
        assert!(gbt.is_active);
        assert_eq!(gbt.confidence_threshold, Some(0.65));
        let lstm = models.iter().find(|m| m.name == "lstm").unwrap();
        assert!(!lstm.is_active);
        assert_eq!(lstm.confidence_threshold, None);
        assert_eq!(lstm.last_trained, None);
    }

    #[test]
    fn paired_mid_requires_both_legs() {
        let t = TradeRecord {
            ts: 0,
            symbol: "DOGE/USDT".into(),
            exchange: None,
            profit: None,
            confidence: None,
            buy_price: Some(0.12),
            sell_price: Some(0.14),
        };
        assert_eq!(t.paired_mid(), Some(0.13));
        let half = TradeRecord { sell_price: None, ..t };
        assert_eq!(half.paired_mid(), None);
    }
}
