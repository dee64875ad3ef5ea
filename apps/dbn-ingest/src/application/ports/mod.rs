//! Application Ports (Driven)
//!
//! Interfaces the session depends on. Adapters live in `infrastructure`.
//!
//! - `FeedClient`: the upstream live record feed
//! - `MarketStore`: the relational store for trades and bars
//! - `RecordArchive`: the byte-for-byte session archive
//! - `IngestMetrics`: counters and gauges the session reports

mod archive_port;
mod feed_port;
mod market_store_port;
mod metrics_port;

pub use archive_port::{ArchiveError, RecordArchive};
pub use feed_port::{FeedClient, FeedError, FeedSchema, SubscriptionRequest, Symbology};
#[cfg(test)]
pub use market_store_port::MockMarketStore;
pub use market_store_port::{MarketStore, StoreError};
pub use metrics_port::{IngestMetrics, NoopMetrics};
