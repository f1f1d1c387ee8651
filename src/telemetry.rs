//! Tracing subscriber setup
//!
//! Logs go to stderr so that stdout carries only the tour itself.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level; `verbose` raises the crate's own level to `debug`.
pub fn init(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(logging, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}

fn default_directive(logging: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        format!("{},tourguide=debug", logging.level)
    } else {
        logging.level.clone()
    }
}
