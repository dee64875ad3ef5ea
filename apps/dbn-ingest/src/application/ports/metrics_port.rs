//! Ingestion Metrics Port
//!
//! Measurements the session reports as it runs. The Prometheus adapter
//! lives in `infrastructure::metrics`; [`NoopMetrics`] discards everything.

use std::fmt::Debug;
use std::time::Duration;

use crate::domain::rows::{Table, UpsertOutcome};
use crate::domain::session::SessionState;

/// Sink for ingestion measurements. Every method defaults to a no-op.
pub trait IngestMetrics: Debug + Send + Sync {
    /// A record was pulled from the feed.
    fn record_received(&self, _label: &'static str) {}

    /// A row was submitted to the store.
    fn record_row(&self, _table: Table, _outcome: UpsertOutcome) {}

    /// A trade or bar was skipped for lack of a ticker.
    fn record_unresolved(&self, _table: Table) {}

    /// A symbol mapping update was applied.
    fn record_mapping_update(&self) {}

    /// Bytes were appended to the archive.
    fn record_archived_bytes(&self, _bytes: u64) {}

    /// The session moved to `state`.
    fn set_session_state(&self, _state: SessionState) {}

    /// Time spent dispatching and archiving one record.
    fn record_processing_duration(&self, _duration: Duration) {}
}

/// Discards every measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl IngestMetrics for NoopMetrics {}
