//! Tracing setup shared by the binaries.

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins; otherwise `default_filter` (e.g. `"info"`) applies.
/// Output goes to stderr so stdout stays free for command output.
/// Calling this twice is harmless: the second install is ignored.
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}
