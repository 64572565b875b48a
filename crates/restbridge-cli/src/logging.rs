//! Logging backend initialization.
//!
//! Configured once at startup from `logging.level`/`logging.format` and
//! otherwise invisible to the rest of the crate graph — no function below
//! the bootstrap boundary takes a logger parameter; every call site just
//! uses the `tracing` macros directly.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global `tracing` subscriber.
///
/// `logging.level` seeds the filter when `RUST_LOG` isn't set, so an
/// operator can still override verbosity per-run without touching config.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
