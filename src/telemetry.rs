//! Logging setup for the `vibe` binary.

use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Directive used when `RUST_LOG` is unset.
///
/// Covers both the library target and the `vibe` binary target.
#[must_use]
pub const fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "vibe_runner=debug,vibe=debug"
    } else {
        "vibe_runner=info,vibe=info"
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `verbose`.
///
/// # Errors
///
/// Returns [`TryInitError`] when a global subscriber is already installed.
pub fn init(verbose: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
}
