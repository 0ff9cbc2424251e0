//! Tracing subscriber setup for binaries embedding the engine

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber with the [`DEFAULT_FILTER`].
///
/// Logs go to stderr so resource bodies printed on stdout stay clean.
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with_default(DEFAULT_FILTER)
}

/// Install the global subscriber, falling back to `default_filter` when
/// `RUST_LOG` is unset or invalid.
pub fn init_with_default(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact();

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
