use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset; keeps stdout progress readable.
pub const DEFAULT_FILTER: &str = "warn";

/// Installs the stderr `tracing` subscriber. Safe to call more than once.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
