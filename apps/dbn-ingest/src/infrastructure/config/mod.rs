//! Configuration Module
//!
//! Command-line parsing and validation into the settings a session runs on.

mod cli;
mod settings;

pub use cli::Cli;
pub use settings::{API_KEY_ENV, ApiKey, ConfigError, IngestConfig, parse_start, resolve_api_key};
