use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber: fmt output on stderr, filtered
/// by `RUST_LOG` (default `info`). Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
