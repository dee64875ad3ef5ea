//! Validated ingestion settings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::cli::Cli;
use crate::application::ports::{FeedSchema, SubscriptionRequest, Symbology};
use crate::application::services::SessionConfig;
use crate::infrastructure::archive::ArchiveDestination;

/// Environment variable consulted when no key is given on the command line.
pub const API_KEY_ENV: &str = "DATABENTO_API_KEY";

/// Feed API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key.
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self(key)
    }

    /// Get the key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Feed API key.
    pub api_key: ApiKey,
    /// Dataset identifier.
    pub dataset: String,
    /// Schemas to subscribe, one request each.
    pub schemas: Vec<FeedSchema>,
    /// Symbology of `symbols`.
    pub stype_in: Symbology,
    /// Symbols to subscribe.
    pub symbols: Vec<String>,
    /// Replay start; `None` is now.
    pub start: Option<DateTime<Utc>>,
    /// Request a snapshot.
    pub snapshot: bool,
    /// Archive destination.
    pub archive: ArchiveDestination,
    /// SQLite database path; `None` is in-memory.
    pub database: Option<String>,
    /// Prometheus listener port; 0 disables.
    pub metrics_port: u16,
}

impl IngestConfig {
    /// Validate parsed arguments, falling back to `env_key` for the API key.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or malformed.
    pub fn from_cli(cli: Cli, env_key: Option<String>) -> Result<Self, ConfigError> {
        let api_key = resolve_api_key(cli.key, env_key)?;

        let dataset = cli.dataset.trim().to_string();
        if dataset.is_empty() {
            return Err(ConfigError::EmptyValue("dataset"));
        }
        if cli.out.trim().is_empty() {
            return Err(ConfigError::EmptyValue("out"));
        }

        let mut schemas = Vec::with_capacity(cli.schemas.len());
        for name in &cli.schemas {
            let schema = name.parse::<FeedSchema>().map_err(ConfigError::Invalid)?;
            if !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }
        if schemas.is_empty() {
            return Err(ConfigError::EmptyValue("schema"));
        }

        let stype_in = cli.stype.parse::<Symbology>().map_err(ConfigError::Invalid)?;
        let start = cli.start.as_deref().map(parse_start).transpose()?;

        Ok(Self {
            api_key,
            dataset,
            schemas,
            stype_in,
            symbols: cli.symbols,
            start,
            snapshot: cli.snapshot,
            archive: ArchiveDestination::parse(&cli.out, cli.zstd),
            database: cli.db,
            metrics_port: cli.metrics_port,
        })
    }

    /// One subscription request per configured schema.
    #[must_use]
    pub fn subscription_requests(&self) -> Vec<SubscriptionRequest> {
        self.schemas
            .iter()
            .map(|&schema| SubscriptionRequest {
                schema,
                stype_in: self.stype_in,
                symbols: self.symbols.clone(),
                start: self.start,
                snapshot: self.snapshot,
            })
            .collect()
    }

    /// Settings for the session controller.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            dataset: self.dataset.clone(),
            subscriptions: self.subscription_requests(),
        }
    }
}

/// Pick the explicit key, else the environment key.
///
/// # Errors
///
/// Returns an error if neither is set or the chosen one is blank.
pub fn resolve_api_key(
    explicit: Option<String>,
    env_key: Option<String>,
) -> Result<ApiKey, ConfigError> {
    let key = explicit
        .filter(|k| !k.trim().is_empty())
        .or(env_key)
        .ok_or(ConfigError::MissingApiKey)?;
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(ConfigError::EmptyValue(API_KEY_ENV));
    }
    Ok(ApiKey::new(key))
}

/// Parse a start time: RFC 3339, a naive date-time taken as UTC, or a date
/// taken as UTC midnight.
///
/// # Errors
///
/// Returns an error if none of the forms match.
pub fn parse_start(input: &str) -> Result<DateTime<Utc>, ConfigError> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(ts.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    Err(ConfigError::InvalidStart(input.to_string()))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No API key on the command line or in the environment.
    #[error("no API key given; pass --key or set DATABENTO_API_KEY")]
    MissingApiKey,
    /// A required value is blank.
    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),
    /// Start time could not be parsed.
    #[error("invalid start time '{0}'; expected ISO-8601")]
    InvalidStart(String),
    /// Unknown schema or symbology.
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use test_case::test_case;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dbn-ingest"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("db-secret".to_string());
        let debug = format!("{key:?}");
        assert!(!debug.contains("db-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let key = resolve_api_key(Some("cli".into()), Some("env".into())).unwrap();
        assert_eq!(key.expose(), "cli");
    }

    #[test]
    fn env_key_is_fallback() {
        let key = resolve_api_key(None, Some("env".into())).unwrap();
        assert_eq!(key.expose(), "env");
        let key = resolve_api_key(Some("  ".into()), Some("env".into())).unwrap();
        assert_eq!(key.expose(), "env");
    }

    #[test]
    fn missing_key_is_rejected() {
        assert!(matches!(
            resolve_api_key(None, None),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(matches!(
            resolve_api_key(None, Some(String::new())),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test_case("2023-11-14T22:13:20Z", 1_700_000_000 ; "rfc3339 utc")]
    #[test_case("2023-11-14T17:13:20-05:00", 1_700_000_000 ; "rfc3339 offset")]
    #[test_case("2023-11-14T22:13:20", 1_700_000_000 ; "naive as utc")]
    #[test_case("2023-11-14 22:13:20", 1_700_000_000 ; "space separated")]
    #[test_case("2023-11-14", 1_699_920_000 ; "date at midnight")]
    fn parses_start(input: &str, expected_secs: i64) {
        assert_eq!(parse_start(input).unwrap().timestamp(), expected_secs);
    }

    #[test_case("yesterday" ; "word")]
    #[test_case("2023-13-01" ; "bad month")]
    #[test_case("" ; "empty")]
    fn rejects_bad_start(input: &str) {
        assert!(matches!(parse_start(input), Err(ConfigError::InvalidStart(_))));
    }

    #[test]
    fn builds_one_request_per_schema() {
        let config = IngestConfig::from_cli(
            cli(&[
                "-d", "TEST", "-k", "key", "-o", "out.dbn", "-s", "trades", "-s", "ohlcv-1m",
                "-s", "trades", "-n", "XYZ",
            ]),
            None,
        )
        .unwrap();

        let requests = config.subscription_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].schema, FeedSchema::Trades);
        assert_eq!(requests[1].schema, FeedSchema::Ohlcv1m);
        assert!(requests.iter().all(|r| r.snapshot && r.symbols == ["XYZ"]));
        assert!(requests.iter().all(|r| r.stype_in == Symbology::RawSymbol));
        assert_eq!(config.session_config().subscriptions, requests);
    }

    #[test]
    fn output_naming_selects_compression() {
        let config =
            IngestConfig::from_cli(cli(&["-d", "TEST", "-k", "k", "-o", "out.dbn.zst"]), None)
                .unwrap();
        assert!(config.archive.is_compressed());

        let config =
            IngestConfig::from_cli(cli(&["-d", "TEST", "-k", "k", "-o", "-"]), None).unwrap();
        assert_eq!(config.archive, ArchiveDestination::Stdout);
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let result = IngestConfig::from_cli(
            cli(&["-d", "TEST", "-k", "k", "-o", "-", "-s", "ticks"]),
            None,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn blank_dataset_is_rejected() {
        let result = IngestConfig::from_cli(cli(&["-d", " ", "-k", "k", "-o", "-"]), None);
        assert!(matches!(result, Err(ConfigError::EmptyValue("dataset"))));
    }
}
