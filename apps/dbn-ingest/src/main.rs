//! DBN Ingest Binary
//!
//! Follows a Databento live session until end of stream or a signal.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dbn-ingest -- -d DBEQ.BASIC -o session.dbn.zst --db ticks.db AAPL MSFT
//! ```
//!
//! # Environment Variables
//!
//! - `DATABENTO_API_KEY`: API key when `--key` is not given
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: dbn-ingest)
//! - `RUST_LOG`: Extra log directives

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dbn_ingest::infrastructure::archive::ArchiveSink;
use dbn_ingest::infrastructure::config::{API_KEY_ENV, Cli, IngestConfig};
use dbn_ingest::infrastructure::databento::DatabentoFeed;
use dbn_ingest::infrastructure::persistence::SqliteStore;
use dbn_ingest::infrastructure::telemetry;
use dbn_ingest::{PrometheusMetrics, SetupError, StreamSession, StreamSummary, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    let cli = Cli::parse();

    let _telemetry_guard = match telemetry::init(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("dbn-ingest: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => tracing::info!(summary = %json, "Ingestion finished"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize summary"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Ingestion failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<StreamSummary> {
    let config = IngestConfig::from_cli(cli, std::env::var(API_KEY_ENV).ok())?;
    log_config(&config);

    init_metrics(config.metrics_port)?;

    let store = Arc::new(SqliteStore::open(config.database.as_deref()).await?);
    let archive = ArchiveSink::open(&config.archive).map_err(SetupError::Archive)?;
    let feed = DatabentoFeed::new(config.api_key.clone(), config.dataset.clone());

    let mut session = StreamSession::connect(
        config.session_config(),
        feed,
        Arc::clone(&store),
        archive,
        Arc::new(PrometheusMetrics),
        CancellationToken::new(),
    )
    .await?;
    let handle = session.handle();
    tracing::info!(session_id = %handle.id(), "Session ready");

    let mut task = tokio::spawn(async move { session.follow_stream().await });

    let summary = tokio::select! {
        joined = &mut task => joined.context("session task panicked")??,
        () = await_shutdown() => {
            if let Err(e) = handle.stop() {
                tracing::warn!(error = %e, "Stop requested before streaming began");
            }
            tracing::info!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Graceful shutdown started"
            );
            if let Ok(joined) = tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                joined.context("session task panicked")??
            } else {
                task.abort();
                anyhow::bail!(
                    "session did not stop within {}s",
                    SHUTDOWN_TIMEOUT.as_secs()
                );
            }
        }
    };

    store.close().await;
    Ok(summary)
}

/// Log the parsed configuration.
fn log_config(config: &IngestConfig) {
    let schemas: Vec<&str> = config.schemas.iter().map(|s| s.as_str()).collect();
    tracing::info!(
        dataset = %config.dataset,
        schemas = ?schemas,
        stype_in = %config.stype_in,
        symbols = config.symbols.len(),
        start = ?config.start,
        snapshot = config.snapshot,
        archive = %config.archive,
        compressed = config.archive.is_compressed(),
        database = config.database.as_deref().unwrap_or(":memory:"),
        "Configuration loaded"
    );
    tracing::debug!(symbols = ?config.symbols, "Requested symbols");
}

/// Load .env from the current directory or any ancestor.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(_)) => {}
        Err(e) => eprintln!("dbn-ingest: ignoring malformed .env: {e}"),
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping session");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping session");
        }
    }
}
