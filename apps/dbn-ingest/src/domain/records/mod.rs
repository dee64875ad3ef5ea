//! Feed Record Variants
//!
//! The closed set of record shapes the ingestion loop understands. Each
//! variant carries its decoded payload; the raw bytes travel alongside in
//! [`StreamRecord`] so the archive can reproduce the feed exactly.

use std::fmt;

// =============================================================================
// Decoded Payloads
// =============================================================================

/// Fixed-point scale of feed prices (1 unit = 1e-9).
pub const FIXED_PRICE_SCALE: u32 = 9;

/// Sentinel used by the feed for an undefined price.
pub const UNDEF_PRICE: i64 = i64::MAX;

/// A single trade print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeEvent {
    /// Numeric instrument identifier.
    pub instrument_id: u32,
    /// Publisher (venue/feed combination) identifier.
    pub publisher_id: u16,
    /// Event timestamp in nanoseconds since the UNIX epoch.
    pub ts_event: u64,
    /// Fixed-point price (see [`FIXED_PRICE_SCALE`]).
    pub price: i64,
    /// Trade size in shares.
    pub size: u32,
}

/// A one-minute OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarEvent {
    /// Numeric instrument identifier.
    pub instrument_id: u32,
    /// Publisher identifier.
    pub publisher_id: u16,
    /// Bar open time in nanoseconds since the UNIX epoch.
    pub ts_event: u64,
    /// Fixed-point open price.
    pub open: i64,
    /// Fixed-point high price.
    pub high: i64,
    /// Fixed-point low price.
    pub low: i64,
    /// Fixed-point close price.
    pub close: i64,
    /// Total volume traded in the bar.
    pub volume: u64,
}

/// An in-stream change to the instrument-id to ticker binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingUpdate {
    /// Numeric instrument identifier being (re)bound.
    pub instrument_id: u32,
    /// Ticker the identifier resolves to from now on.
    pub ticker: String,
    /// Event timestamp in nanoseconds since the UNIX epoch.
    pub ts_event: u64,
}

// =============================================================================
// Record Kinds
// =============================================================================

/// Record types that are recognized but carry nothing to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Top-of-book quote snapshots (MBP-1, BBO, consolidated BBO).
    Quote,
    /// Order-book deltas (MBO, MBP-10).
    BookDelta,
    /// OHLCV bars at intervals other than one minute.
    OtherBar,
    /// Auction imbalance.
    Imbalance,
    /// Venue statistics.
    Statistics,
    /// Trading status change.
    Status,
    /// Instrument definition.
    InstrumentDefinition,
    /// Gateway error notice.
    ErrorNotice,
    /// Gateway system notice (heartbeats, subscription acks).
    SystemNotice,
    /// A record type tag this build does not know.
    Unknown(u8),
}

impl RecordKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::BookDelta => "book_delta",
            Self::OtherBar => "other_bar",
            Self::Imbalance => "imbalance",
            Self::Statistics => "statistics",
            Self::Status => "status",
            Self::InstrumentDefinition => "instrument_definition",
            Self::ErrorNotice => "error_notice",
            Self::SystemNotice => "system_notice",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Feed Record
// =============================================================================

/// A decoded feed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRecord {
    /// Trade print (persisted to `trades`).
    Trade(TradeEvent),
    /// One-minute bar (persisted to `candles`).
    Bar(BarEvent),
    /// Symbol mapping change (applied to the resolver).
    SymbolMapping(MappingUpdate),
    /// Recognized but uninteresting record.
    Ignored(RecordKind),
}

impl FeedRecord {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Trade(_) => "trade",
            Self::Bar(_) => "bar",
            Self::SymbolMapping(_) => "symbol_mapping",
            Self::Ignored(kind) => kind.as_str(),
        }
    }
}

/// A record as pulled from the feed: verbatim bytes plus decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    raw: Vec<u8>,
    record: FeedRecord,
}

impl StreamRecord {
    /// Pair the raw bytes of a record with its decoded form.
    #[must_use]
    pub const fn new(raw: Vec<u8>, record: FeedRecord) -> Self {
        Self { raw, record }
    }

    /// The record exactly as it arrived on the wire.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The decoded record.
    #[must_use]
    pub const fn record(&self) -> &FeedRecord {
        &self.record
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// A record could not be turned into a [`FeedRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The record body does not match its declared type.
    #[error("malformed {kind} record: {reason}")]
    Malformed {
        /// Declared record kind.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl DecodeError {
    /// Convenience constructor for a malformed record.
    #[must_use]
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}
