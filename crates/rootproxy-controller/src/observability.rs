//! Log subscriber setup. The level filter sits behind a reload handle so the
//! configured level can replace the bootstrap one once config is loaded.

use std::sync::OnceLock;

use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() -> bool {
    init_tracing_with_level("info")
}

/// Installs the global subscriber. Returns `false` if one was already
/// installed, in which case the existing subscriber keeps running.
pub fn init_tracing_with_level(level: &str) -> bool {
    // RUST_LOG wins over the provided level
    let base_filter = std::env::var_os("RUST_LOG")
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let installed = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();

    if let Err(e) = installed {
        debug!(error = %e, "Tracing subscriber already installed, keeping it");
        return false;
    }
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        warn!("Log reload handle already set, level changes go to the first subscriber");
    }
    true
}

/// Applies the configured level unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        debug!(level, "RUST_LOG is set, ignoring configured level");
        return;
    }
    let Some(handle) = LOG_RELOAD_HANDLE.get() else {
        debug!(level, "No reloadable subscriber installed");
        return;
    };
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(e) => {
            warn!(level, error = %e, "Invalid log level, keeping current filter");
            return;
        }
    };
    if let Err(e) = handle.modify(|f| *f = filter) {
        warn!(level, error = %e, "Failed to apply log level");
    }
}
