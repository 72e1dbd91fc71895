//! Logging initialization.
//!
//! `tracing` events go to stderr, human-readable or JSON. Stdout is kept
//! for command output. `RUST_LOG` overrides the configured level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// The level to log at: `debug` when `--verbose` is given, else the config's.
pub fn effective_level(config: &LoggingConfig, verbose: bool) -> &str {
    if verbose { "debug" } else { &config.level }
}

/// Initialize from the `[logging]` section plus command-line overrides.
pub fn init_from_config(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    let json_format = json_logs || config.format == LogFormat::Json;
    init(effective_level(config, verbose), json_format);
}
