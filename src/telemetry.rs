//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr. The filter is taken from
//! `RUST_LOG` when set, otherwise from the `-v` count, otherwise from the
//! config file's `log` key, and defaults to `warn`.

use crate::error::{Result, SshfanError};
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "warn";

/// Pick the filter directive from verbosity and config.
pub fn filter_directive(verbosity: u8, configured: Option<&str>) -> String {
    match verbosity {
        0 => configured.unwrap_or(DEFAULT_FILTER).to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`SshfanError::Telemetry`] if the directive is invalid or a
/// subscriber is already installed.
pub fn init(verbosity: u8, configured: Option<&str>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directive(verbosity, configured))
            .map_err(|e| SshfanError::Telemetry(e.to_string()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init()
        .map_err(|e| SshfanError::Telemetry(e.to_string()))
}
