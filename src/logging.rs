//! Diagnostic logging setup.
//!
//! All diagnostics go through `tracing` to stderr, so command output on
//! stdout (`warm`, `check`, `gen-config`) stays pipeable. `RUST_LOG` selects
//! levels (default `info`); `--log-json` switches to one JSON object per line.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

pub const DEFAULT_FILTER: &str = "info";

/// Filter from a `RUST_LOG`-style directive, falling back to
/// [`DEFAULT_FILTER`] when absent or unparsable.
pub fn filter_from(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Call once, at startup.
pub fn init(json: bool) -> Result<(), TryInitError> {
    let filter = filter_from(std::env::var("RUST_LOG").ok().as_deref());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().finish().try_init()
    } else {
        builder.finish().try_init()
    }
}
