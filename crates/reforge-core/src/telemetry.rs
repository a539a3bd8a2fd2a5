//! Log subscriber setup for the `reforge` binary and embedders.
//!
//! Logs always go to stderr so that reports printed on stdout stay
//! machine-readable. `RUST_LOG` overrides the configured level.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON.
    Json,
}

/// Subscriber settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub format: LogFormat,
    pub level: Level,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: Level::INFO,
        }
    }
}

impl LogOptions {
    /// INFO, or DEBUG when `verbose`.
    pub fn for_cli(verbose: bool, json: bool) -> Self {
        Self {
            format: if json { LogFormat::Json } else { LogFormat::Text },
            level: if verbose { Level::DEBUG } else { Level::INFO },
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }

    /// Install the global subscriber. Returns `false` when one was already set.
    pub fn install(self) -> bool {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        let registry = tracing_subscriber::registry().with(self.filter());
        match self.format {
            LogFormat::Json => registry.with(layer.json()).try_init().is_ok(),
            LogFormat::Text => registry.with(layer).try_init().is_ok(),
        }
    }
}

/// Install a subscriber with `json` formatting and a default `level`.
pub fn init_tracing(json: bool, level: Level) -> bool {
    LogOptions {
        format: if json { LogFormat::Json } else { LogFormat::Text },
        level,
    }
    .install()
}
