//! Startup errors.

use thiserror::Error;

use crate::config::ConfigError;

/// Anything that stops `provisiond` from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] event_log::EventLogError),

    /// An HTTP client could not be built for a provider.
    #[error("Failed to build {provider} client: {source}")]
    ProviderClient {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
