//! Configuration for fleetctl.

use anyhow::{bail, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// fleetctl configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let log_level =
            std::env::var("FLEETINIT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match std::env::var("FLEETINIT_LOG_FORMAT") {
            Ok(v) => parse_log_format(&v)?,
            Err(_) => LogFormat::default(),
        };

        Ok(Self {
            log_level,
            log_format,
        })
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat> {
    match s.to_lowercase().as_str() {
        "text" | "" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => bail!("invalid FLEETINIT_LOG_FORMAT '{other}' (expected 'text' or 'json')"),
    }
}
