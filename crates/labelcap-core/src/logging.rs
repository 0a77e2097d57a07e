//! Tracing setup

use tracing_subscriber::EnvFilter;

/// Env var checked before `RUST_LOG`
pub const LOG_ENV: &str = "LABELCAP_LOG";

/// Installs a `tracing_subscriber` using `LABELCAP_LOG` first, then `RUST_LOG`, then `default`.
///
/// Field conventions: `dataset` and `label` on every scoped operation, `key`
/// on uploads and deletes, `token` on selection events.
///
/// Events go to stderr. Returns `false` if a global subscriber was already
/// installed.
pub fn init_tracing(default: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// Filter from `LABELCAP_LOG`, then `RUST_LOG`, then `default`
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default))
}
