//! Logging initialisation over `tracing-subscriber`.
//!
//! Installs a global [`tracing`] subscriber with an env-filter and a
//! formatted stderr layer (human-readable by default, JSON lines when
//! configured). The `RUST_LOG` environment variable wins over the
//! configured default directives when it is set and parses.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directives could not be parsed.
    #[error("invalid filter directive: {0}")]
    Filter(String),
    /// A global subscriber is already installed.
    #[error("subscriber already installed: {0}")]
    Init(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    filter: String,
    ansi: bool,
    json: bool,
}

impl LogConfig {
    /// Create a config with the default `info` filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
            json: false,
        }
    }

    /// Set the default filter directives (used when `RUST_LOG` is unset).
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enable or disable ANSI colour output.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Emit newline-delimited JSON instead of the human-readable format.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the configured filter does not parse or a global
/// subscriber is already installed.
pub fn try_init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.filter)?,
    };

    let registry = Registry::default().with(filter);

    // `.json()` changes the layer type, so each format installs its own
    // stack.
    let installed = if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true);
        registry.with(fmt_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(true);
        registry.with(fmt_layer).try_init()
    };
    installed.map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(filter = %config.filter, "logging initialised");
    Ok(())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives)
        .map_err(|e| LoggingError::Filter(format!("{directives}: {e}")))
}
