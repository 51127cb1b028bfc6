//! Tracing subscriber setup for binaries and examples.

use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "murmur=info,murmur_tacotron=info,murmur_vocoder=info";

/// Install a formatted subscriber.
///
/// `RUST_LOG` wins when set, then `filter`, then [`DEFAULT_FILTER`]. Safe to
/// call more than once; later calls are ignored.
pub fn setup_logging(filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(env_filter)
        .try_init();
}
