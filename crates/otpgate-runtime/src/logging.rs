//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Configuration-driven: the level field accepts either a bare level
//! (`info`) or a full `EnvFilter` directive string (`info,otpgate=debug`).
//! A `RUST_LOG` environment variable overrides the configured value.

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// Initializes the global subscriber from configuration.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_from_config(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|e| {
            warn!(level = %config.level, error = %e, "Invalid log filter, falling back to info");
            EnvFilter::new("info")
        });

    let builder = fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    // Already-initialized is fine (tests initialize repeatedly).
    let _ = result;
}
