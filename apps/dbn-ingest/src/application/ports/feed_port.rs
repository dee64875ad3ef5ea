//! Feed Port (Driven Port)
//!
//! Interface to the upstream real-time feed. The session drives it through
//! authenticate, subscribe, start, and then pulls records one at a time.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::metadata::SessionMetadata;
use crate::domain::records::{DecodeError, StreamRecord};

// =============================================================================
// Subscription Vocabulary
// =============================================================================

/// Record schemas a session may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedSchema {
    /// Trade prints.
    Trades,
    /// One-minute OHLCV bars.
    Ohlcv1m,
    /// One-second OHLCV bars.
    Ohlcv1s,
    /// One-hour OHLCV bars.
    Ohlcv1h,
    /// Daily OHLCV bars.
    Ohlcv1d,
    /// Top of book.
    Mbp1,
    /// Ten levels of book depth.
    Mbp10,
    /// Full order book.
    Mbo,
    /// Top of book on trade.
    Tbbo,
    /// Top of book sampled every second.
    Bbo1s,
    /// Top of book sampled every minute.
    Bbo1m,
    /// Instrument definitions.
    Definition,
    /// Venue statistics.
    Statistics,
    /// Trading status.
    Status,
    /// Auction imbalance.
    Imbalance,
}

impl FeedSchema {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Ohlcv1m => "ohlcv-1m",
            Self::Ohlcv1s => "ohlcv-1s",
            Self::Ohlcv1h => "ohlcv-1h",
            Self::Ohlcv1d => "ohlcv-1d",
            Self::Mbp1 => "mbp-1",
            Self::Mbp10 => "mbp-10",
            Self::Mbo => "mbo",
            Self::Tbbo => "tbbo",
            Self::Bbo1s => "bbo-1s",
            Self::Bbo1m => "bbo-1m",
            Self::Definition => "definition",
            Self::Statistics => "statistics",
            Self::Status => "status",
            Self::Imbalance => "imbalance",
        }
    }
}

impl fmt::Display for FeedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trades" => Ok(Self::Trades),
            "ohlcv-1m" => Ok(Self::Ohlcv1m),
            "ohlcv-1s" => Ok(Self::Ohlcv1s),
            "ohlcv-1h" => Ok(Self::Ohlcv1h),
            "ohlcv-1d" => Ok(Self::Ohlcv1d),
            "mbp-1" => Ok(Self::Mbp1),
            "mbp-10" => Ok(Self::Mbp10),
            "mbo" => Ok(Self::Mbo),
            "tbbo" => Ok(Self::Tbbo),
            "bbo-1s" => Ok(Self::Bbo1s),
            "bbo-1m" => Ok(Self::Bbo1m),
            "definition" => Ok(Self::Definition),
            "statistics" => Ok(Self::Statistics),
            "status" => Ok(Self::Status),
            "imbalance" => Ok(Self::Imbalance),
            other => Err(format!("unknown schema '{other}'")),
        }
    }
}

/// How requested symbols are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Symbology {
    /// Venue ticker, e.g. `AAPL`.
    #[default]
    RawSymbol,
    /// Numeric instrument id.
    InstrumentId,
    /// Parent symbol, e.g. `ES.FUT`.
    Parent,
    /// Continuous contract, e.g. `ES.c.0`.
    Continuous,
}

impl Symbology {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RawSymbol => "raw_symbol",
            Self::InstrumentId => "instrument_id",
            Self::Parent => "parent",
            Self::Continuous => "continuous",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw_symbol" | "raw" => Ok(Self::RawSymbol),
            "instrument_id" | "id" => Ok(Self::InstrumentId),
            "parent" => Ok(Self::Parent),
            "continuous" => Ok(Self::Continuous),
            other => Err(format!("unknown symbology '{other}'")),
        }
    }
}

/// One subscription request, issued per configured schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    /// Schema to subscribe.
    pub schema: FeedSchema,
    /// Symbology of `symbols`.
    pub stype_in: Symbology,
    /// Symbols to subscribe.
    pub symbols: Vec<String>,
    /// Replay start; `None` means now.
    pub start: Option<DateTime<Utc>>,
    /// Request an order book snapshot.
    pub snapshot: bool,
}

// =============================================================================
// Errors
// =============================================================================

/// Feed errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Gateway rejected the credentials or could not be reached.
    #[error("feed authentication failed: {0}")]
    Authentication(String),

    /// A subscription request was refused.
    #[error("subscription for {schema} rejected: {message}")]
    Subscription {
        /// Schema of the rejected request.
        schema: FeedSchema,
        /// Gateway message.
        message: String,
    },

    /// Operation not valid in the client's current state.
    #[error("feed not ready: {0}")]
    NotReady(&'static str),

    /// A record could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Connection lost or I/O failure.
    #[error("feed transport error: {0}")]
    Transport(String),
}

// =============================================================================
// Port
// =============================================================================

/// Port for a live record feed.
#[async_trait]
pub trait FeedClient: Send {
    /// Connect and authenticate with the gateway.
    async fn authenticate(&mut self) -> Result<(), FeedError>;

    /// Issue one subscription request.
    async fn subscribe(&mut self, request: &SubscriptionRequest) -> Result<(), FeedError>;

    /// Start the session and return its metadata.
    async fn start(&mut self) -> Result<SessionMetadata, FeedError>;

    /// Next record in arrival order, `None` at end of stream.
    async fn next_record(&mut self) -> Result<Option<StreamRecord>, FeedError>;

    /// Close the connection. Safe to call more than once.
    async fn stop(&mut self) -> Result<(), FeedError>;
}
