//! Adapter configuration.
//!
//! Adapters receive everything they need through these structs; nothing is
//! read from the process environment here.

use std::fmt;
use std::time::Duration;

/// Production base URL of the Hostinger API.
pub const DEFAULT_HOSTINGER_BASE_URL: &str = "https://developers.hostinger.com/api";

/// Port of the WHM API on a panel host.
pub const WHM_PORT: u16 = 2087;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a domain registrar API.
#[derive(Clone)]
pub struct RegistrarConfig {
    pub base_url: String,
    pub api_token: String,
    /// Registration period in years.
    pub registration_period: u32,
    pub timeout: Duration,
}

impl RegistrarConfig {
    /// Creates a configuration for the production API.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_HOSTINGER_BASE_URL.to_string(),
            api_token: api_token.into(),
            registration_period: 1,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_registration_period(mut self, years: u32) -> Self {
        self.registration_period = years;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for RegistrarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("registration_period", &self.registration_period)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for a WHM-style hosting panel.
#[derive(Clone)]
pub struct HostingPanelConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    /// Accept self-signed certificates on the panel host.
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl HostingPanelConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            api_token: api_token.into(),
            accept_invalid_certs: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Targets `https://{host}:2087`.
    pub fn for_host(
        host: &str,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self::new(format!("https://{host}:{WHM_PORT}"), username, api_token)
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for HostingPanelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostingPanelConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}
