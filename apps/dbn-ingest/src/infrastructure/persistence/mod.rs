//! SQLite Market Store
//!
//! `MarketStore` adapter over a `sqlx` SQLite pool. Each write is a single
//! `INSERT ... ON CONFLICT DO NOTHING`; a conflicting natural key reports
//! [`UpsertOutcome::Duplicate`] instead of an error. The pool is `Clone`
//! and may be shared with readers.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::application::ports::{MarketStore, StoreError};
use crate::domain::rows::{
    CandleRow, DEFAULT_TRADE_LIMIT, SortOrder, TimeRange, TradeRow, UpsertOutcome,
};

const MEMORY_URL: &str = "sqlite::memory:";

/// Pool size for file-backed databases.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// ============================================================================
// Schema
// ============================================================================

const MIGRATIONS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS trades (
        date      TEXT    NOT NULL,
        timestamp INTEGER NOT NULL,
        nanos     INTEGER NOT NULL,
        publisher INTEGER NOT NULL,
        ticker    TEXT    NOT NULL,
        price     REAL    NOT NULL,
        shares    INTEGER NOT NULL
    )
    ",
    "CREATE UNIQUE INDEX IF NOT EXISTS trades_publisher_date_ticker_ts ON trades (publisher, date, ticker, timestamp)",
    "CREATE UNIQUE INDEX IF NOT EXISTS trades_publisher_ticker_date_ts ON trades (publisher, ticker, date, timestamp)",
    "CREATE UNIQUE INDEX IF NOT EXISTS trades_publisher_ts_ticker ON trades (publisher, timestamp, ticker)",
    "CREATE UNIQUE INDEX IF NOT EXISTS trades_publisher_ticker_ts ON trades (publisher, ticker, timestamp)",
    r"
    CREATE TABLE IF NOT EXISTS candles (
        date      TEXT    NOT NULL,
        timestamp INTEGER NOT NULL,
        nanos     INTEGER NOT NULL,
        publisher INTEGER NOT NULL,
        ticker    TEXT    NOT NULL,
        volume    INTEGER NOT NULL,
        open      REAL    NOT NULL,
        high      REAL    NOT NULL,
        low       REAL    NOT NULL,
        close     REAL    NOT NULL
    )
    ",
    "CREATE UNIQUE INDEX IF NOT EXISTS candles_publisher_date_ticker_ts ON candles (publisher, date, ticker, timestamp)",
    "CREATE UNIQUE INDEX IF NOT EXISTS candles_publisher_ticker_date_ts ON candles (publisher, ticker, date, timestamp)",
    "CREATE UNIQUE INDEX IF NOT EXISTS candles_publisher_ts_ticker ON candles (publisher, timestamp, ticker)",
    "CREATE UNIQUE INDEX IF NOT EXISTS candles_publisher_ticker_ts ON candles (publisher, ticker, timestamp)",
];

// ============================================================================
// Store
// ============================================================================

/// SQLite-backed market store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `path`, creating it if needed. `None` opens a
    /// private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: Option<&str>) -> Result<Self, StoreError> {
        match path {
            Some(path) => Self::open_file(path).await,
            None => {
                warn!("No database given; rows are kept in memory and lost on exit");
                Self::in_memory().await
            }
        }
    }

    /// Open a file-backed database in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn open_file(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            path,
            max_connections = DEFAULT_MAX_CONNECTIONS,
            "SQLite connection pool initialized"
        );
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// the database lives only as long as that connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(MEMORY_URL)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!("In-memory SQLite database opened");
        Ok(Self { pool })
    }

    /// Close the pool, waiting for connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_trade(row: &SqliteRow) -> Result<TradeRow, StoreError> {
        let field = |e: sqlx::Error| query_error("decode trade", &e);
        Ok(TradeRow {
            date: row.try_get("date").map_err(field)?,
            timestamp: row.try_get("timestamp").map_err(field)?,
            nanos: row.try_get("nanos").map_err(field)?,
            publisher: row.try_get("publisher").map_err(field)?,
            ticker: row.try_get("ticker").map_err(field)?,
            price: row.try_get("price").map_err(field)?,
            shares: row.try_get("shares").map_err(field)?,
        })
    }

    fn row_to_candle(row: &SqliteRow) -> Result<CandleRow, StoreError> {
        let field = |e: sqlx::Error| query_error("decode candle", &e);
        Ok(CandleRow {
            date: row.try_get("date").map_err(field)?,
            timestamp: row.try_get("timestamp").map_err(field)?,
            nanos: row.try_get("nanos").map_err(field)?,
            publisher: row.try_get("publisher").map_err(field)?,
            ticker: row.try_get("ticker").map_err(field)?,
            volume: row.try_get("volume").map_err(field)?,
            open: row.try_get("open").map_err(field)?,
            high: row.try_get("high").map_err(field)?,
            low: row.try_get("low").map_err(field)?,
            close: row.try_get("close").map_err(field)?,
        })
    }
}

fn query_error(operation: &'static str, err: &sqlx::Error) -> StoreError {
    StoreError::Query {
        operation,
        message: err.to_string(),
    }
}

const fn outcome(rows_affected: u64) -> UpsertOutcome {
    if rows_affected == 0 {
        UpsertOutcome::Duplicate
    } else {
        UpsertOutcome::Inserted
    }
}

#[async_trait]
impl MarketStore for SqliteStore {
    async fn migrate(&self) -> Result<(), StoreError> {
        let migration = |e: sqlx::Error| StoreError::Migration(e.to_string());
        let mut tx = self.pool.begin().await.map_err(migration)?;
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(migration)?;
        }
        tx.commit().await.map_err(migration)?;

        debug!(statements = MIGRATIONS.len(), "Schema migrated");
        Ok(())
    }

    async fn upsert_trade(&self, row: &TradeRow) -> Result<UpsertOutcome, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO trades (date, timestamp, nanos, publisher, ticker, price, shares)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(row.date)
        .bind(row.timestamp)
        .bind(row.nanos)
        .bind(row.publisher)
        .bind(&row.ticker)
        .bind(row.price)
        .bind(row.shares)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("insert trade", &e))?;

        Ok(outcome(result.rows_affected()))
    }

    async fn upsert_candle(&self, row: &CandleRow) -> Result<UpsertOutcome, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO candles (date, timestamp, nanos, publisher, ticker, volume, open, high, low, close)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(row.date)
        .bind(row.timestamp)
        .bind(row.nanos)
        .bind(row.publisher)
        .bind(&row.ticker)
        .bind(row.volume)
        .bind(row.open)
        .bind(row.high)
        .bind(row.low)
        .bind(row.close)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("insert candle", &e))?;

        Ok(outcome(result.rows_affected()))
    }

    async fn last_trades(
        &self,
        ticker: &str,
        range: TimeRange,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<TradeRow>, StoreError> {
        let sql = match order {
            SortOrder::NewestFirst => {
                r"
                SELECT date, timestamp, nanos, publisher, ticker, price, shares
                FROM trades
                WHERE ticker = ? AND timestamp >= ? AND timestamp < ?
                ORDER BY timestamp DESC, nanos DESC
                LIMIT ?
                "
            }
            SortOrder::OldestFirst => {
                r"
                SELECT date, timestamp, nanos, publisher, ticker, price, shares
                FROM trades
                WHERE ticker = ? AND timestamp >= ? AND timestamp < ?
                ORDER BY timestamp ASC, nanos ASC
                LIMIT ?
                "
            }
        };

        let rows = sqlx::query(sql)
            .bind(ticker)
            .bind(range.start)
            .bind(range.end)
            .bind(i64::from(limit.unwrap_or(DEFAULT_TRADE_LIMIT)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("select trades", &e))?;

        rows.iter().map(Self::row_to_trade).collect()
    }

    async fn candles(&self, ticker: &str, range: TimeRange) -> Result<Vec<CandleRow>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT date, timestamp, nanos, publisher, ticker, volume, open, high, low, close
            FROM candles
            WHERE ticker = ? AND timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC
            ",
        )
        .bind(ticker)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("select candles", &e))?;

        rows.iter().map(Self::row_to_candle).collect()
    }
}
