//! Tracing/logging initialization.
//!
//! - `RUST_LOG` selects the filter (default `info`).
//! - `STOCKALLOC_LOG_FORMAT` selects `json` (default) or `pretty` output.

use core::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "STOCKALLOC_LOG_FORMAT";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format {0:?} (expected \"json\" or \"pretty\")")]
pub struct ParseLogFormatError(String);

impl FromStr for LogFormat {
    type Err = ParseLogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            _ => Err(ParseLogFormatError(s.to_string())),
        }
    }
}

/// Initialize tracing for the process using environment configuration.
///
/// An unreadable `STOCKALLOC_LOG_FORMAT` falls back to JSON and is reported
/// once the subscriber is up.
pub fn init() {
    let requested = std::env::var(LOG_FORMAT_VAR).ok();
    let parsed = requested.as_deref().map(LogFormat::from_str).transpose();

    match parsed {
        Ok(format) => init_with(format.unwrap_or_default()),
        Err(err) => {
            init_with(LogFormat::Json);
            ::tracing::warn!("{err}; using json");
        }
    }
}

/// Initialize tracing with an explicit format. Safe to call multiple times.
pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
