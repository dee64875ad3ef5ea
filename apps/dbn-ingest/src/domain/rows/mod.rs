//! Relational Rows
//!
//! Normalization of trade and bar events into the rows the store persists.
//! Event timestamps are split into whole seconds plus a nanosecond
//! remainder, and the UTC calendar date is derived for date-partitioned
//! indexes. Prices are converted from the feed's fixed-point form to the
//! three decimal places the price columns hold.

use chrono::{DateTime, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::records::{BarEvent, DecodeError, FIXED_PRICE_SCALE, TradeEvent, UNDEF_PRICE};

/// Decimal places kept in persisted prices.
pub const PRICE_DECIMALS: u32 = 3;

/// Row limit applied to trade queries when the caller gives none.
pub const DEFAULT_TRADE_LIMIT: u32 = 25;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

// =============================================================================
// Timestamp Decomposition
// =============================================================================

/// An event timestamp split for storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitTimestamp {
    /// UTC calendar date.
    pub date: NaiveDate,
    /// Whole seconds since the UNIX epoch.
    pub seconds: i64,
    /// Nanosecond remainder.
    pub nanos: i64,
}

impl SplitTimestamp {
    /// Split a nanosecond UNIX timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp is beyond the representable date range.
    pub fn from_nanos(kind: &'static str, ts_event: u64) -> Result<Self, DecodeError> {
        let seconds = i64::try_from(ts_event / NANOS_PER_SECOND)
            .map_err(|_| DecodeError::malformed(kind, format!("timestamp {ts_event} out of range")))?;
        let nanos = i64::try_from(ts_event % NANOS_PER_SECOND)
            .map_err(|_| DecodeError::malformed(kind, format!("timestamp {ts_event} out of range")))?;
        let date = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| DecodeError::malformed(kind, format!("timestamp {ts_event} out of range")))?
            .date_naive();

        Ok(Self {
            date,
            seconds,
            nanos,
        })
    }
}

/// Convert a fixed-point feed price to its persisted decimal value.
///
/// Halves round away from zero.
///
/// # Errors
///
/// Returns an error if the price is the feed's undefined sentinel.
pub fn price_from_fixed(kind: &'static str, price: i64) -> Result<f64, DecodeError> {
    if price == UNDEF_PRICE {
        return Err(DecodeError::malformed(kind, "undefined price"));
    }
    Decimal::new(price, FIXED_PRICE_SCALE)
        .round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .ok_or_else(|| DecodeError::malformed(kind, format!("price {price} not representable")))
}

// =============================================================================
// Rows
// =============================================================================

/// A persisted trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    /// UTC trade date.
    pub date: NaiveDate,
    /// Whole seconds since the UNIX epoch.
    pub timestamp: i64,
    /// Nanosecond remainder of the event timestamp.
    pub nanos: i64,
    /// Publisher identifier.
    pub publisher: i64,
    /// Resolved ticker.
    pub ticker: String,
    /// Trade price, three decimal places.
    pub price: f64,
    /// Trade size.
    pub shares: i64,
}

impl TradeRow {
    /// Normalize a trade event bound to `ticker`.
    ///
    /// # Errors
    ///
    /// Returns an error if the price is undefined or the timestamp is out of range.
    pub fn from_event(event: &TradeEvent, ticker: &str) -> Result<Self, DecodeError> {
        let ts = SplitTimestamp::from_nanos("trade", event.ts_event)?;
        Ok(Self {
            date: ts.date,
            timestamp: ts.seconds,
            nanos: ts.nanos,
            publisher: i64::from(event.publisher_id),
            ticker: ticker.to_string(),
            price: price_from_fixed("trade", event.price)?,
            shares: i64::from(event.size),
        })
    }
}

/// A persisted one-minute bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRow {
    /// UTC bar date.
    pub date: NaiveDate,
    /// Bar open, whole seconds since the UNIX epoch.
    pub timestamp: i64,
    /// Nanosecond remainder of the bar timestamp.
    pub nanos: i64,
    /// Publisher identifier.
    pub publisher: i64,
    /// Resolved ticker.
    pub ticker: String,
    /// Volume traded in the bar.
    pub volume: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
}

impl CandleRow {
    /// Normalize a bar event bound to `ticker`.
    ///
    /// # Errors
    ///
    /// Returns an error if any price is undefined, the volume does not fit a
    /// signed column, or the timestamp is out of range.
    pub fn from_event(event: &BarEvent, ticker: &str) -> Result<Self, DecodeError> {
        let ts = SplitTimestamp::from_nanos("bar", event.ts_event)?;
        let volume = i64::try_from(event.volume)
            .map_err(|_| DecodeError::malformed("bar", format!("volume {} out of range", event.volume)))?;
        Ok(Self {
            date: ts.date,
            timestamp: ts.seconds,
            nanos: ts.nanos,
            publisher: i64::from(event.publisher_id),
            ticker: ticker.to_string(),
            volume,
            open: price_from_fixed("bar", event.open)?,
            high: price_from_fixed("bar", event.high)?,
            low: price_from_fixed("bar", event.low)?,
            close: price_from_fixed("bar", event.close)?,
        })
    }
}

// =============================================================================
// Query Shapes
// =============================================================================

/// Half-open range `[start, end)` in whole seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: i64,
    /// Exclusive upper bound.
    pub end: i64,
}

impl TimeRange {
    /// Create a range from whole-second bounds.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether `seconds` falls inside the range.
    #[must_use]
    pub const fn contains(&self, seconds: i64) -> bool {
        self.start <= seconds && seconds < self.end
    }
}

/// Result ordering by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Descending timestamp.
    #[default]
    NewestFirst,
    /// Ascending timestamp.
    OldestFirst,
}

/// Persisted tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// `trades`.
    Trades,
    /// `candles`.
    Candles,
}

impl Table {
    /// Table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Candles => "candles",
        }
    }
}

/// What an idempotent insert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was written.
    Inserted,
    /// A row with the same natural key already existed; nothing changed.
    Duplicate,
}

impl UpsertOutcome {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Duplicate => "duplicate",
        }
    }
}
