//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus process-level
//! concerns (configuration, logging, metrics).

/// Databento live feed adapter.
pub mod databento;

/// SQLite market store.
pub mod persistence;

/// DBN archive file sink.
pub mod archive;

/// Command line and validated settings.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
