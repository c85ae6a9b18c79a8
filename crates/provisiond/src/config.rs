//! Service configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use orchestrator::{DispatcherConfig, OrchestratorConfig};
use providers::{HostingPanelConfig, RegistrarConfig};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format (`LOG_FORMAT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected text or json, got {other}")),
        }
    }
}

/// Everything `provisiond` needs to start.
///
/// | Env Var                          | Default                                 |
/// |----------------------------------|-----------------------------------------|
/// | `HOST`                           | `0.0.0.0`                               |
/// | `PORT`                           | `3000`                                  |
/// | `RUST_LOG`                       | `info`                                  |
/// | `LOG_FORMAT`                     | `text`                                  |
/// | `DATABASE_URL`                   | required                                |
/// | `DATABASE_MAX_CONNECTIONS`       | `10`                                    |
/// | `HOSTINGER_API_TOKEN`            | required                                |
/// | `HOSTINGER_BASE_URL`             | `https://developers.hostinger.com/api`  |
/// | `HOSTINGER_REGISTRATION_PERIOD`  | `1`                                     |
/// | `WHM_BASE_URL` or `WHM_HOST`     | one required                            |
/// | `WHM_USER`                       | `root`                                  |
/// | `WHM_API_TOKEN`                  | required                                |
/// | `WHM_ACCEPT_INVALID_CERTS`       | `false`                                 |
/// | `PROVIDER_TIMEOUT_SECS`          | `30`                                    |
/// | `PROVISIONING_WORKERS`           | `4`                                     |
/// | `PROVISIONING_QUEUE_CAPACITY`    | `256`                                   |
/// | `PROVISIONING_USERNAME_PREFIX`   | `user`                                  |
/// | `PROVISIONING_DEFAULT_PLAN`      | `plano_default`                         |
/// | `PENDING_SWEEP_INTERVAL_SECS`    | `60` (`0` disables the sweeper)         |
#[derive(Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: String,
    pub database_max_connections: u32,
    pub registrar: RegistrarConfig,
    pub hosting_panel: HostingPanelConfig,
    pub orchestrator: OrchestratorConfig,
    pub dispatcher: DispatcherConfig,
    /// Panel package used when a service's plan names none.
    pub default_plan: String,
    /// `None` when the pending sweeper is disabled.
    pub sweep_interval: Option<Duration>,
}

impl ServiceConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let provider_timeout = Duration::from_secs(env.parse_or("PROVIDER_TIMEOUT_SECS", 30u64)?);

        let mut registrar = RegistrarConfig::new(env.required("HOSTINGER_API_TOKEN")?)
            .with_registration_period(env.parse_or("HOSTINGER_REGISTRATION_PERIOD", 1u32)?)
            .with_timeout(provider_timeout);
        if let Some(base_url) = env.optional("HOSTINGER_BASE_URL") {
            registrar = registrar.with_base_url(base_url);
        }

        let whm_user = env.optional("WHM_USER").unwrap_or_else(|| "root".to_string());
        let whm_token = env.required("WHM_API_TOKEN")?;
        let hosting_panel = match (env.optional("WHM_BASE_URL"), env.optional("WHM_HOST")) {
            (Some(base_url), _) => HostingPanelConfig::new(base_url, whm_user, whm_token),
            (None, Some(host)) => HostingPanelConfig::for_host(&host, whm_user, whm_token),
            (None, None) => return Err(ConfigError::Missing("WHM_HOST")),
        }
        .with_accept_invalid_certs(env.parse_or("WHM_ACCEPT_INVALID_CERTS", false)?)
        .with_timeout(provider_timeout);

        let mut orchestrator = OrchestratorConfig::default().with_call_timeout(provider_timeout);
        if let Some(prefix) = env.optional("PROVISIONING_USERNAME_PREFIX") {
            orchestrator = orchestrator.with_username_prefix(prefix);
        }

        let dispatcher = DispatcherConfig {
            workers: env.parse_or("PROVISIONING_WORKERS", 4usize)?,
            queue_capacity: env.parse_or("PROVISIONING_QUEUE_CAPACITY", 256usize)?,
        };
        if dispatcher.workers == 0 {
            return Err(ConfigError::Invalid {
                name: "PROVISIONING_WORKERS",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        let sweep_secs: u64 = env.parse_or("PENDING_SWEEP_INTERVAL_SECS", 60)?;

        Ok(Self {
            host: env.optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.parse_or("PORT", 3000u16)?,
            log_level: env.optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Text)?,
            database_url: env.required("DATABASE_URL")?,
            database_max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 10u32)?,
            registrar,
            hosting_panel,
            orchestrator,
            dispatcher,
            default_plan: env
                .optional("PROVISIONING_DEFAULT_PLAN")
                .unwrap_or_else(|| "plano_default".to_string()),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("database_url", &"<redacted>")
            .field("database_max_connections", &self.database_max_connections)
            .field("registrar", &self.registrar)
            .field("hosting_panel", &self.hosting_panel)
            .field("orchestrator", &self.orchestrator)
            .field("dispatcher", &self.dispatcher)
            .field("default_plan", &self.default_plan)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and not blank.
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => match value.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => Err(ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                    value,
                }),
            },
        }
    }
}
