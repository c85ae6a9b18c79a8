//! Hostinger domain API client.
//!
//! Registration is two calls: a WHOIS profile is created for the registrant,
//! then the domain is purchased against that profile. Transfers are a
//! single call carrying the EPP code.

use async_trait::async_trait;
use common::RegistrantDetails;
use serde::{Deserialize, Serialize};

use crate::{
    DomainRegistrar, ProviderError, RegistrarConfig, RegistrarOrder,
    http::{build_client, parse_response, transport_error},
};

const PROVIDER: &str = "hostinger";

#[derive(Debug, Serialize)]
struct WhoisProfileRequest<'a> {
    tld: &'a str,
    country: &'a str,
    entity_type: &'static str,
    whois_details: WhoisDetails<'a>,
}

#[derive(Debug, Serialize)]
struct WhoisDetails<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    address: &'a str,
    city: &'a str,
    state: &'a str,
    zip: &'a str,
    country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tax_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WhoisProfileResponse {
    id: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct PurchaseRequest<'a> {
    domain: &'a str,
    whois_profile_id: &'a serde_json::Value,
    period: u32,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    domain: &'a str,
    auth_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: serde_json::Value,
}

/// Registrar backed by the Hostinger domains API.
pub struct HostingerRegistrar {
    client: reqwest::Client,
    config: RegistrarConfig,
}

impl HostingerRegistrar {
    /// Builds the client. Fails only if the TLS backend cannot be initialised.
    pub fn new(config: RegistrarConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.timeout, false)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        parse_response(PROVIDER, response).await
    }

    async fn create_whois_profile(
        &self,
        domain: &str,
        registrant: &RegistrantDetails,
    ) -> Result<serde_json::Value, ProviderError> {
        let request = WhoisProfileRequest {
            tld: tld_of(domain),
            country: &registrant.country,
            entity_type: if registrant.tax_id.is_some() {
                "organization"
            } else {
                "individual"
            },
            whois_details: WhoisDetails {
                name: &registrant.name,
                email: &registrant.email,
                phone: &registrant.phone,
                address: &registrant.address,
                city: &registrant.city,
                state: &registrant.state,
                zip: &registrant.postcode,
                country: &registrant.country,
                tax_id: registrant.tax_id.as_deref(),
            },
        };

        let profile: WhoisProfileResponse = self.post("/domains/v1/whois", &request).await?;
        Ok(profile.id)
    }
}

#[async_trait]
impl DomainRegistrar for HostingerRegistrar {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    #[tracing::instrument(skip(self, registrant))]
    async fn register(
        &self,
        domain: &str,
        registrant: &RegistrantDetails,
    ) -> Result<RegistrarOrder, ProviderError> {
        let missing = registrant.missing_fields();
        if !missing.is_empty() {
            return Err(ProviderError::rejected(
                PROVIDER,
                format!("registrant is missing {}", missing.join(", ")),
            ));
        }

        let profile_id = self.create_whois_profile(domain, registrant).await?;
        tracing::debug!(%profile_id, "whois profile created");

        let order: OrderResponse = self
            .post(
                "/domains/v1/portfolio",
                &PurchaseRequest {
                    domain,
                    whois_profile_id: &profile_id,
                    period: self.config.registration_period,
                },
            )
            .await?;

        Ok(RegistrarOrder {
            order_id: order_id_to_string(order.order_id)?,
        })
    }

    #[tracing::instrument(skip(self, auth_code))]
    async fn transfer(
        &self,
        domain: &str,
        auth_code: &str,
    ) -> Result<RegistrarOrder, ProviderError> {
        let order: OrderResponse = self
            .post("/domains/v1/transfers", &TransferRequest { domain, auth_code })
            .await?;

        Ok(RegistrarOrder {
            order_id: order_id_to_string(order.order_id)?,
        })
    }
}

/// Everything after the second-level label: `example.com.br` -> `com.br`.
fn tld_of(domain: &str) -> &str {
    domain.split_once('.').map(|(_, tld)| tld).unwrap_or(domain)
}

fn order_id_to_string(value: serde_json::Value) -> Result<String, ProviderError> {
    match value {
        serde_json::Value::String(id) if !id.is_empty() => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        other => Err(ProviderError::rejected(
            PROVIDER,
            format!("unexpected order id in response: {other}"),
        )),
    }
}
