use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, Env};

const DEFAULT_FILTER: &str = "admin_console=debug,console_shell=debug";

/// init_tracing
///
/// Installs the global subscriber. `RUST_LOG` wins over the default filter.
/// Local runs get pretty, human-readable output; production emits JSON for
/// log aggregation. Calling it twice is harmless: the second install fails
/// quietly.
pub fn init_tracing(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match config.env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if result.is_ok() {
        tracing::info!("console starting in {:?} mode", config.env);
    }
}
