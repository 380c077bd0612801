//! Log output for applications that do not install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `LIRU_LOG=liru=debug`.
pub const ENV_LOG: &str = "LIRU_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Install a formatted stderr subscriber filtered by `LIRU_LOG` (default
/// `warn`). Does nothing if a global subscriber is already set.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
