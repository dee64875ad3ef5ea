//! Market Store Port (Driven Port)
//!
//! Relational store for normalized trades and bars. Writes are idempotent
//! on the natural key `(publisher, ticker, timestamp)`. The handle is shared
//! with readers outside the ingestion loop, so implementations must be safe
//! for concurrent use.

use async_trait::async_trait;

use crate::domain::rows::{CandleRow, SortOrder, TimeRange, TradeRow, UpsertOutcome};

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not open or reach the database.
    #[error("store connection failed: {0}")]
    Connection(String),

    /// Schema creation failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A statement was rejected.
    #[error("{operation} failed: {message}")]
    Query {
        /// Operation that failed.
        operation: &'static str,
        /// Driver message.
        message: String,
    },
}

/// Port for trade and bar persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Create tables and indexes if they do not exist.
    async fn migrate(&self) -> Result<(), StoreError>;

    /// Insert a trade, doing nothing if its natural key exists.
    async fn upsert_trade(&self, row: &TradeRow) -> Result<UpsertOutcome, StoreError>;

    /// Insert a bar, doing nothing if its natural key exists.
    async fn upsert_candle(&self, row: &CandleRow) -> Result<UpsertOutcome, StoreError>;

    /// Trades for `ticker` within `range`.
    async fn last_trades(
        &self,
        ticker: &str,
        range: TimeRange,
        order: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<TradeRow>, StoreError>;

    /// Bars for `ticker` within `range`, oldest first.
    async fn candles(&self, ticker: &str, range: TimeRange) -> Result<Vec<CandleRow>, StoreError>;
}
