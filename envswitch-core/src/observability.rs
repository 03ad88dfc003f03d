/*!
Logging setup.

Installs a `tracing-subscriber` registry with an `EnvFilter` and either the
plain or the JSON `fmt` layer. `RUST_LOG` overrides the configured level.
*/

use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LogFormat;
use crate::{EnvSwitchError, Result};

/// Filter directive for a level name; `verbose` forces `debug`
pub fn filter_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level.trim() };
    let level = if level.is_empty() { "info" } else { level };
    format!("envswitch={level},envswitch_core={level},envswitch_cli={level}")
}

/// Install the global subscriber
///
/// Fails when a global subscriber is already set.
pub fn init_logging(level: &str, format: LogFormat, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)));

    let result = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(false)
                .with_writer(std::io::stderr);
            set_global_default(Registry::default().with(filter).with(fmt_layer))
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr);
            set_global_default(Registry::default().with(filter).with(fmt_layer))
        }
    };

    result.map_err(|e| EnvSwitchError::Logging(format!("failed to set global tracing subscriber: {e}")))
}
