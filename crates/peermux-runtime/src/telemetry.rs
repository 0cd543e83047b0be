//! Logging setup for binaries embedding the multiplexer
//!
//! Libraries only emit `tracing` events; installing a subscriber is left to
//! the process entry point.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use peermux_core::{MuxError, MuxResult};

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = MuxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(MuxError::InvalidConfig(format!("unknown log format: {}", other))),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Logs go to stderr so
/// record output on stdout stays clean.
pub fn init_logging(format: LogFormat, default_level: &str) -> MuxResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| MuxError::InvalidConfig(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| MuxError::InvalidConfig(format!("logging already initialized: {}", e)))
}
