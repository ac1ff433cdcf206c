//! Structured logging initialisation for the Seal node.
//!
//! Two output formats are supported:
//! - [`LogFormat::Human`]: human-readable lines for development.
//! - [`LogFormat::Json`]: newline-delimited JSON for log aggregation.
//!
//! `RUST_LOG` overrides the configured level when set.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::NodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(NodeError::Config(format!("unknown log format {other:?}"))),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), NodeError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    };
    installed.map_err(|e| NodeError::Config(format!("logging already initialised: {e}")))
}
