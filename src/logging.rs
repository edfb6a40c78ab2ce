use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output for
/// this crate.
pub fn init_logging(verbose: bool) -> Result<(), String> {
    let default_filter = if verbose {
        "binfixture=debug,warn"
    } else {
        "binfixture=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {e}"))?;

    tracing::debug!(
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "verbose logging enabled"
    );
    Ok(())
}
