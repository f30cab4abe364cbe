use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. `RUST_LOG` overrides `config.level`.
///
/// Logs go to stderr so command output on stdout stays machine-readable. Returns `false` when a
/// subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.is_ok()
}
