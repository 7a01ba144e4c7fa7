//! Process-wide tracing subscriber setup.

use tracing_subscriber::{
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is unset: dependencies at `warn`, this crate at `level`.
fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("warn,gateway_core={level}"))
}

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.level`. Any format other than `json` logs
/// in the pretty format.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| default_filter(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).try_init()
    }
}
