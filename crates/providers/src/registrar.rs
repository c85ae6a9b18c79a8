//! Domain registrar capability and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::RegistrantDetails;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// A registrar order created by `register` or `transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarOrder {
    pub order_id: String,
}

/// Registers or transfers domain names with an external registrar.
#[async_trait]
pub trait DomainRegistrar: Send + Sync {
    /// Short provider name, used in event types (`<provider>.<operation>.initiated`).
    fn provider_name(&self) -> &str;

    /// Registers a new domain for the registrant.
    async fn register(
        &self,
        domain: &str,
        registrant: &RegistrantDetails,
    ) -> Result<RegistrarOrder, ProviderError>;

    /// Starts a transfer of a domain held at another registrar.
    async fn transfer(&self, domain: &str, auth_code: &str)
    -> Result<RegistrarOrder, ProviderError>;
}

/// One call received by [`InMemoryRegistrar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarCall {
    pub operation: &'static str,
    pub domain: String,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct InMemoryRegistrarState {
    calls: Vec<RegistrarCall>,
    next_id: u32,
    failure: Option<ProviderError>,
    latency: Option<Duration>,
}

/// In-memory registrar for testing.
///
/// Order IDs are `ORD-1`, `ORD-2`, ... in call order.
#[derive(Debug, Clone)]
pub struct InMemoryRegistrar {
    name: String,
    state: Arc<RwLock<InMemoryRegistrarState>>,
}

impl Default for InMemoryRegistrar {
    fn default() -> Self {
        Self::new("hostinger")
    }
}

impl InMemoryRegistrar {
    /// Creates a registrar reporting the given provider name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Makes every following call fail with `error` (or succeed again with `None`).
    pub fn set_failure(&self, error: Option<ProviderError>) {
        self.state.write().unwrap().failure = error;
    }

    /// Delays every call, to simulate a slow or hanging registrar.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().unwrap().latency = latency;
    }

    /// All calls received, in order.
    pub fn calls(&self) -> Vec<RegistrarCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Number of calls received, successful or not.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls.len()
    }

    /// Number of calls that created an order.
    pub fn successful_calls(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.succeeded)
            .count()
    }

    async fn place_order(
        &self,
        operation: &'static str,
        domain: &str,
    ) -> Result<RegistrarOrder, ProviderError> {
        let latency = self.state.read().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().unwrap();
        let outcome = match state.failure.clone() {
            Some(error) => Err(error),
            None => {
                state.next_id += 1;
                Ok(RegistrarOrder {
                    order_id: format!("ORD-{}", state.next_id),
                })
            }
        };
        state.calls.push(RegistrarCall {
            operation,
            domain: domain.to_string(),
            succeeded: outcome.is_ok(),
        });
        outcome
    }
}

#[async_trait]
impl DomainRegistrar for InMemoryRegistrar {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn register(
        &self,
        domain: &str,
        _registrant: &RegistrantDetails,
    ) -> Result<RegistrarOrder, ProviderError> {
        self.place_order("register", domain).await
    }

    async fn transfer(
        &self,
        domain: &str,
        _auth_code: &str,
    ) -> Result<RegistrarOrder, ProviderError> {
        self.place_order("transfer", domain).await
    }
}
