#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::cast_possible_truncation,
        clippy::too_many_lines,
        clippy::items_after_statements
    )
)]

//! DBN Ingest - Live Market Data Recorder
//!
//! Follows a Databento live session, archives every record byte-for-byte
//! and normalizes trades and one-minute bars into SQLite, in one ordered
//! pass over the stream.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure ingestion types and logic
//!   - `records`: Decoded record variants
//!   - `metadata`: Session metadata
//!   - `symbology`: Point-in-time symbol resolution
//!   - `rows`: Relational row normalization
//!   - `session`: Lifecycle state machine
//!
//! - **Application**: Ports and services
//!   - `ports`: Feed, store and archive interfaces
//!   - `services`: Record dispatch and the session controller
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `databento`: Live feed client
//!   - `persistence`: SQLite store
//!   - `archive`: DBN archive file
//!   - `config`: Command line and settings
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                    ┌────────────┐    ┌────────────┐
//! Databento ───────> │  Session   │──> │ Dispatcher │──> SQLite (trades, candles)
//!   live             │    loop    │    └────────────┘
//!                    │            │──> Archive (.dbn / .dbn.zst / stdout)
//!                    └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core ingestion types with no I/O.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Error taxonomy.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::metadata::SessionMetadata;
pub use domain::records::{FeedRecord, StreamRecord};
pub use domain::rows::{CandleRow, SortOrder, TimeRange, TradeRow, UpsertOutcome};
pub use domain::session::{SessionState, StreamEnd, StreamSummary};
pub use domain::symbology::{Resolution, SymbolResolver};

// Application
pub use application::ports::{
    ArchiveError, FeedClient, FeedError, FeedSchema, IngestMetrics, MarketStore, NoopMetrics,
    RecordArchive, StoreError, SubscriptionRequest, Symbology,
};
pub use application::services::{
    DispatchOutcome, SessionConfig, SessionHandle, StreamSession, dispatch,
};

// Errors
pub use error::{IngestError, LifecycleError, SetupError};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
