//! Prometheus Metrics Module
//!
//! Exposes ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Records**: Counts of records received by kind
//! - **Rows**: Trades and bars written or collapsed as duplicates
//! - **Symbology**: Mapping updates and unresolved instruments
//! - **Archive**: Bytes written to the archive
//! - **Session**: Current lifecycle state
//!
//! # Integration
//!
//! [`PrometheusMetrics`] implements the session's `IngestMetrics` port.
//! When a port is configured, metrics are served at `/metrics` on it.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::ports::IngestMetrics;
use crate::domain::rows::{Table, UpsertOutcome};
use crate::domain::session::SessionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics installation errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be built.
    #[error("failed to build Prometheus exporter: {0}")]
    Build(#[from] metrics_exporter_prometheus::BuildError),

    /// Another global recorder is already installed.
    #[error("failed to install metrics recorder: {0}")]
    Install(String),
}

/// Initialize the Prometheus metrics recorder.
///
/// With `port` 0 metrics are recorded but not served. Must be called from
/// within a Tokio runtime when a port is given. Later calls return the
/// handle from the first.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or a different global
/// recorder is already installed.
pub fn init_metrics(port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let builder = PrometheusBuilder::new();
    let handle = if port == 0 {
        builder.install_recorder()?
    } else {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let (recorder, exporter) = builder.with_http_listener(addr).build()?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Prometheus exporter stopped");
            }
        });
        tracing::info!(%addr, "Metrics endpoint listening");
        handle
    };

    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "dbn_ingest_records_total",
        "Total records received from the feed by kind"
    );
    describe_counter!(
        "dbn_ingest_rows_total",
        "Rows submitted to the store by table and outcome"
    );
    describe_counter!(
        "dbn_ingest_unresolved_total",
        "Trades and bars skipped because the instrument had no ticker"
    );
    describe_counter!(
        "dbn_ingest_mapping_updates_total",
        "Symbol mapping updates applied"
    );
    describe_counter!(
        "dbn_ingest_archived_bytes_total",
        "Bytes written to the archive"
    );
    describe_gauge!(
        "dbn_ingest_session_state",
        "Session lifecycle state (0=created .. 6=stopped)"
    );
    describe_histogram!(
        "dbn_ingest_record_processing_seconds",
        "Time to dispatch and archive one record"
    );
}

// =============================================================================
// Port Adapter
// =============================================================================

/// Records ingestion metrics through the global `metrics` recorder.
///
/// Without an installed recorder every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl IngestMetrics for PrometheusMetrics {
    fn record_received(&self, label: &'static str) {
        counter!("dbn_ingest_records_total", "kind" => label).increment(1);
    }

    fn record_row(&self, table: Table, outcome: UpsertOutcome) {
        counter!(
            "dbn_ingest_rows_total",
            "table" => table.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    fn record_unresolved(&self, table: Table) {
        counter!("dbn_ingest_unresolved_total", "table" => table.as_str()).increment(1);
    }

    fn record_mapping_update(&self) {
        counter!("dbn_ingest_mapping_updates_total").increment(1);
    }

    fn record_archived_bytes(&self, bytes: u64) {
        counter!("dbn_ingest_archived_bytes_total").increment(bytes);
    }

    fn set_session_state(&self, state: SessionState) {
        gauge!("dbn_ingest_session_state").set(f64::from(state.code()));
    }

    fn record_processing_duration(&self, duration: Duration) {
        histogram!("dbn_ingest_record_processing_seconds").record(duration.as_secs_f64());
    }
}

// =============================================================================
// Tests
// =============================================================================
