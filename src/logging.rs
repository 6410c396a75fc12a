use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, writing to stderr.
///
/// Honors `RUST_LOG`; defaults to `pctx=info`. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pctx=info"));

    // try_init so double-init in tests doesn't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
