//! Process-wide tracing setup.
//!
//! Every binary calls [`init`] once at startup. The filter comes from
//! `RUST_LOG` and falls back to `info`. Repeated calls are no-ops, so tests
//! and binaries can both call it freely.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global `fmt` subscriber with an env-driven filter.
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Like [`init`], with a caller-chosen fallback filter.
pub fn init_with_default(default_filter: &str) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // Another subscriber may already be installed (e.g. by a test harness).
        let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init_with_default("debug");
        tracing::info!("logging initialised twice without panicking");
    }
}
