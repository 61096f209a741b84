//! Logging setup

use crate::config::ObservabilityConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// reports printed on stdout stay clean.
pub fn init_tracing(config: &ObservabilityConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // Ignore the error if a subscriber is already installed (tests, embedding)
    if config.json_logging {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
