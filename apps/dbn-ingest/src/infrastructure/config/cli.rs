//! Command-line interface.

use clap::Parser;

/// Follow a live feed, archive every record and store trades and bars.
#[derive(Debug, Clone, Parser)]
#[command(name = "dbn-ingest")]
#[command(about = "Record a Databento live session to a DBN archive and SQLite")]
#[command(version)]
pub struct Cli {
    /// SQLite database file (default: in-memory)
    #[arg(long)]
    pub db: Option<String>,

    /// Dataset identifier, e.g. DBEQ.BASIC
    #[arg(short, long)]
    pub dataset: String,

    /// API key (default: $DATABENTO_API_KEY)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Archive destination; '-' for stdout, '.zst' suffix compresses
    #[arg(short, long)]
    pub out: String,

    /// Schema to subscribe; repeat for several
    #[arg(short, long = "schema", default_value = "trades")]
    pub schemas: Vec<String>,

    /// Symbology of the given symbols
    #[arg(long, default_value = "raw_symbol")]
    pub stype: String,

    /// Replay start, ISO-8601 (default: now)
    #[arg(short = 't', long)]
    pub start: Option<String>,

    /// Request a snapshot on subscribe
    #[arg(short = 'n', long)]
    pub snapshot: bool,

    /// Compress the archive with zstd regardless of its name
    #[arg(long)]
    pub zstd: bool,

    /// Prometheus metrics port; 0 disables the listener
    #[arg(long, default_value_t = 0)]
    pub metrics_port: u16,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Symbols to subscribe
    pub symbols: Vec<String>,
}
