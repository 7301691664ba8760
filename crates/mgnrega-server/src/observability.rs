//! Log setup for the gateway.
//!
//! Logging starts at `info` before the config file is read, so config errors
//! are visible. Once loaded, `logging.level` replaces the filter in place.
//! An operator-supplied `RUST_LOG` always wins over both. Per-request spans
//! come from the router's trace layer; cache-tier fallbacks log at `warn`,
//! upstream and cache hits at `debug`.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

const STARTUP_LEVEL: &str = "info";

static LOG_FILTER: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter_layer, handle) = reload::Layer::new(filter_for(rust_log.as_deref(), STARTUP_LEVEL));
    let _ = LOG_FILTER.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init();
}

/// Swap in the configured level. No-op while `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = LOG_FILTER.get() {
        let _ = handle.modify(|f| *f = filter_for(None, level));
    }
}

/// A malformed `RUST_LOG` falls back to `level`.
fn filter_for(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
