//! Console logging setup.
//!
//! The library itself only emits `tracing` events; embedders that want
//! console output without wiring their own subscriber can call
//! [`init`] once at startup. Verbosity is controlled through the
//! standard `RUST_LOG` environment variable and defaults to `info`.

use tracing_subscriber::EnvFilter;

/// Install a console `tracing` subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
