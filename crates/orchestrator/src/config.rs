//! Orchestrator and worker pool settings.

use std::time::Duration;

/// Settings for a provisioning run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on each registrar or hosting panel call.
    pub call_timeout: Duration,
    /// Hosting usernames are this prefix followed by the lineage root ID.
    pub username_prefix: String,
    pub password_length: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            username_prefix: "user".to_string(),
            password_length: 16,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_username_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.username_prefix = prefix.into();
        self
    }

    pub fn with_password_length(mut self, length: usize) -> Self {
        self.password_length = length;
        self
    }
}

/// Size of the provisioning worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of runs executing at once.
    pub workers: usize,
    /// Launches buffered beyond the running ones; further launches are refused.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}
