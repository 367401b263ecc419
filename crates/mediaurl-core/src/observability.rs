//! Observability: tracing init.
//!
//! Uses config::ObservabilityConfig for MEDIAURL_QUIET, MEDIAURL_LOG_LEVEL and
//! MEDIAURL_LOG_JSON.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Tracing initialization mode.
#[derive(Clone, Copy)]
pub enum TracingMode {
    /// Use MEDIAURL_LOG_LEVEL / MEDIAURL_QUIET from env
    Default,
    /// Probe diagnostics on: per-endpoint failures are logged at debug level
    Verbose,
}

/// Initialize tracing. Call once at process startup; later calls are no-ops.
/// When MEDIAURL_QUIET=1 only WARN and above are logged.
pub fn init_tracing(mode: TracingMode) {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let mut level: String = if cfg.quiet {
        "mediaurl=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    if matches!(mode, TracingMode::Verbose) {
        level = format!("{},mediaurl_client=debug", level);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}
