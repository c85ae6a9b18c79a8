//! WHM hosting panel client.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    HostingAccount, HostingAccountProvisioner, HostingPanelConfig, NewHostingAccount,
    ProviderError,
    http::{build_client, parse_response, transport_error},
};

const PROVIDER: &str = "whm";

#[derive(Debug, Deserialize)]
struct WhmResponse {
    metadata: WhmMetadata,
}

#[derive(Debug, Deserialize)]
struct WhmMetadata {
    result: i64,
    #[serde(default)]
    reason: String,
}

/// Creates cPanel accounts through the WHM JSON API (`createacct`).
pub struct WhmProvisioner {
    client: reqwest::Client,
    config: HostingPanelConfig,
}

impl WhmProvisioner {
    pub fn new(config: HostingPanelConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.timeout, config.accept_invalid_certs)?;
        Ok(Self { client, config })
    }

    fn authorization(&self) -> String {
        format!("whm {}:{}", self.config.username, self.config.api_token)
    }
}

#[async_trait]
impl HostingAccountProvisioner for WhmProvisioner {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    #[tracing::instrument(skip_all, fields(username = %account.username, domain = %account.domain))]
    async fn create_account(
        &self,
        account: &NewHostingAccount,
    ) -> Result<HostingAccount, ProviderError> {
        let response = self
            .client
            .get(format!("{}/json-api/createacct", self.config.base_url))
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .query(&[
                ("api.version", "1"),
                ("username", account.username.as_str()),
                ("domain", account.domain.as_str()),
                ("plan", account.plan.as_str()),
                ("password", account.password.expose()),
                ("contactemail", account.contact_email.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let body: WhmResponse = parse_response(PROVIDER, response).await?;

        // WHM answers 200 for refused requests; the verdict is in metadata.
        if body.metadata.result != 1 {
            return Err(ProviderError::rejected(PROVIDER, body.metadata.reason));
        }

        Ok(HostingAccount {
            handle: account.username.clone(),
        })
    }
}
