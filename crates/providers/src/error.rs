//! Provider error taxonomy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by registrar and hosting panel adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network failure, timeout, or a server-side error. Retrying later may succeed.
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// The provider explicitly declined the request.
    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: String, message: String },
}

/// The class of a [`ProviderError`], as recorded in failure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    ProviderUnavailable,
    ProviderRejected,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::ProviderUnavailable => "provider_unavailable",
            ProviderErrorKind::ProviderRejected => "provider_rejected",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderError {
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rejected(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Rejected {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// A call that did not answer within `after`.
    pub fn timed_out(provider: impl Into<String>, after: Duration) -> Self {
        Self::unavailable(provider, format!("no response within {}s", after.as_secs_f64()))
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Unavailable { .. } => ProviderErrorKind::ProviderUnavailable,
            ProviderError::Rejected { .. } => ProviderErrorKind::ProviderRejected,
        }
    }

    /// Returns true if re-running the workflow later may succeed without
    /// operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Unavailable { provider, .. } | ProviderError::Rejected { provider, .. } => {
                provider
            }
        }
    }

    /// The provider's message, without the provider prefix.
    pub fn message(&self) -> &str {
        match self {
            ProviderError::Unavailable { message, .. } | ProviderError::Rejected { message, .. } => {
                message
            }
        }
    }
}
