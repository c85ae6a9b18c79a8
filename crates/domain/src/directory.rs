//! Read access to client and catalog data owned by the back office.
//!
//! Provisioning needs a few facts it does not own: the registrant's WHOIS
//! contact details and the hosting-panel package of the purchased plan.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::{ClientId, DirectoryError, RegistrantDetails, ServiceId};

/// Source of registrant details and plan names.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Returns the WHOIS contact details of a client.
    async fn registrant(&self, client_id: ClientId) -> Result<RegistrantDetails, DirectoryError>;

    /// Returns the hosting-panel package name for a service.
    async fn plan_name(&self, service_id: ServiceId) -> Result<String, DirectoryError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    clients: HashMap<ClientId, RegistrantDetails>,
    plans: HashMap<ServiceId, Option<String>>,
    unavailable: bool,
}

/// In-memory directory for testing.
#[derive(Clone)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
    default_plan: String,
}

impl InMemoryDirectory {
    /// Creates an empty directory falling back to `default_plan`.
    pub fn new(default_plan: impl Into<String>) -> Self {
        Self {
            state: Arc::default(),
            default_plan: default_plan.into(),
        }
    }

    /// Adds or replaces a client.
    pub async fn add_client(&self, client_id: ClientId, details: RegistrantDetails) {
        self.state.write().await.clients.insert(client_id, details);
    }

    /// Adds a service; `None` means its plan has no panel package.
    pub async fn add_service(&self, service_id: ServiceId, package: Option<&str>) {
        self.state
            .write()
            .await
            .plans
            .insert(service_id, package.map(str::to_string));
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn registrant(&self, client_id: ClientId) -> Result<RegistrantDetails, DirectoryError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(DirectoryError::Unavailable("in-memory directory offline".to_string()));
        }
        state
            .clients
            .get(&client_id)
            .cloned()
            .ok_or(DirectoryError::ClientNotFound(client_id))
    }

    async fn plan_name(&self, service_id: ServiceId) -> Result<String, DirectoryError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(DirectoryError::Unavailable("in-memory directory offline".to_string()));
        }
        match state.plans.get(&service_id) {
            Some(package) => Ok(resolve_plan(package.as_deref(), &self.default_plan)),
            None => Err(DirectoryError::ServiceNotFound(service_id)),
        }
    }
}

/// Directory over the back office's `clients`, `services` and `plans` tables.
#[derive(Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
    default_plan: String,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool, default_plan: impl Into<String>) -> Self {
        Self {
            pool,
            default_plan: default_plan.into(),
        }
    }
}

#[async_trait]
impl AccountDirectory for PostgresDirectory {
    async fn registrant(&self, client_id: ClientId) -> Result<RegistrantDetails, DirectoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(NULLIF(contact_name, ''), company_name, '') AS name,
                COALESCE(email, '') AS email,
                COALESCE(phone, '') AS phone,
                COALESCE(address, '') AS address,
                COALESCE(city, '') AS city,
                COALESCE(state, '') AS state,
                COALESCE(zip, '') AS postcode,
                COALESCE(country, '') AS country,
                NULLIF(cpf_cnpj, '') AS tax_id
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(client_id.as_i64())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DirectoryError::ClientNotFound(client_id))?;

        Ok(RegistrantDetails {
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            postcode: row.try_get("postcode")?,
            country: row.try_get("country")?,
            tax_id: row.try_get("tax_id")?,
        })
    }

    async fn plan_name(&self, service_id: ServiceId) -> Result<String, DirectoryError> {
        let package: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT p.whm_package_name
            FROM services s
            LEFT JOIN plans p ON p.id = s.product_id
            WHERE s.id = $1
            "#,
        )
        .bind(service_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match package {
            Some(package) => Ok(resolve_plan(package.as_deref(), &self.default_plan)),
            None => Err(DirectoryError::ServiceNotFound(service_id)),
        }
    }
}

fn resolve_plan(package: Option<&str>, default_plan: &str) -> String {
    match package.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_plan.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registrant_lookup() {
        let directory = InMemoryDirectory::new("plano_default");
        directory
            .add_client(ClientId::new(7), RegistrantDetails::new("Ana", "ana@example.com"))
            .await;

        let details = directory.registrant(ClientId::new(7)).await.unwrap();
        assert_eq!(details.email, "ana@example.com");

        let missing = directory.registrant(ClientId::new(8)).await;
        assert!(matches!(missing, Err(DirectoryError::ClientNotFound(_))));
    }

    #[tokio::test]
    async fn plan_falls_back_to_default() {
        let directory = InMemoryDirectory::new("plano_default");
        directory.add_service(ServiceId::new(1), Some("gold")).await;
        directory.add_service(ServiceId::new(2), None).await;
        directory.add_service(ServiceId::new(3), Some("  ")).await;

        assert_eq!(directory.plan_name(ServiceId::new(1)).await.unwrap(), "gold");
        assert_eq!(directory.plan_name(ServiceId::new(2)).await.unwrap(), "plano_default");
        assert_eq!(directory.plan_name(ServiceId::new(3)).await.unwrap(), "plano_default");

        let missing = directory.plan_name(ServiceId::new(4)).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn unavailable_directory() {
        let directory = InMemoryDirectory::new("plano_default");
        directory.set_unavailable(true).await;
        let err = directory.plan_name(ServiceId::new(1)).await.unwrap_err();
        assert!(!err.is_not_found());
    }
}
