//! Domain Layer - Core ingestion types and logic.
//!
//! Pure types with no I/O: what the feed delivers, how identifiers resolve
//! to tickers, how events become rows, and how a session moves through its
//! lifecycle.

/// Decoded feed record variants.
pub mod records;

/// Session metadata announced by the feed.
pub mod metadata;

/// Point-in-time instrument id to ticker resolution.
pub mod symbology;

/// Relational row normalization and query shapes.
pub mod rows;

/// Session state machine and summary.
pub mod session;
