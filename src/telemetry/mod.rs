//! Tracing bootstrap helpers.
//!
//! The engine emits structured `tracing` spans and events (one span per
//! invocation, debug events per step); this module wires up a sensible
//! subscriber for binaries and tests that do not bring their own.
//!
//! The filter is read from the `STATEGRAPH_LOG` environment variable (a
//! standard `EnvFilter` directive string, `.env` files honored), falling
//! back to `info`.

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the tracing filter directives.
pub const LOG_ENV_VAR: &str = "STATEGRAPH_LOG";

/// Install the default subscriber: env-filtered fmt output plus span-trace
/// capture for error reports.
///
/// Returns an error if a global subscriber is already set.
pub fn try_init() -> Result<(), TryInitError> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true))
        .with(ErrorLayer::default())
        .try_init()
}

/// Like [`try_init`], but ignores an already-installed subscriber. Handy in
/// tests where multiple cases race to initialize.
pub fn init() {
    let _ = try_init();
}
