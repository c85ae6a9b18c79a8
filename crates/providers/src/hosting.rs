//! Hosting account capability and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{OneTimePassword, ProviderError};

/// Request to create a hosting account.
#[derive(Debug, Clone)]
pub struct NewHostingAccount {
    pub username: String,
    pub domain: String,
    pub plan: String,
    pub password: OneTimePassword,
    pub contact_email: String,
}

/// A created hosting account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingAccount {
    /// Panel-side identifier of the account.
    pub handle: String,
}

/// Creates hosting accounts on a control panel.
#[async_trait]
pub trait HostingAccountProvisioner: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn create_account(
        &self,
        account: &NewHostingAccount,
    ) -> Result<HostingAccount, ProviderError>;
}

#[derive(Debug, Default)]
struct InMemoryPanelState {
    accounts: HashMap<String, NewHostingAccount>,
    calls: usize,
    failure: Option<ProviderError>,
    latency: Option<Duration>,
}

/// In-memory hosting panel for testing.
///
/// Rejects duplicate usernames like a real panel.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHostingPanel {
    state: Arc<RwLock<InMemoryPanelState>>,
}

impl InMemoryHostingPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `error` (or succeed again with `None`).
    pub fn set_failure(&self, error: Option<ProviderError>) {
        self.state.write().unwrap().failure = error;
    }

    /// Delays every call, to simulate a slow or hanging panel.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().unwrap().latency = latency;
    }

    /// Number of calls received, successful or not.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls
    }

    /// Number of accounts created.
    pub fn account_count(&self) -> usize {
        self.state.read().unwrap().accounts.len()
    }

    /// Returns the stored request for an account.
    pub fn account(&self, username: &str) -> Option<NewHostingAccount> {
        self.state.read().unwrap().accounts.get(username).cloned()
    }
}

#[async_trait]
impl HostingAccountProvisioner for InMemoryHostingPanel {
    fn provider_name(&self) -> &str {
        "memory-panel"
    }

    async fn create_account(
        &self,
        account: &NewHostingAccount,
    ) -> Result<HostingAccount, ProviderError> {
        let latency = self.state.read().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().unwrap();
        state.calls += 1;

        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        if state.accounts.contains_key(&account.username) {
            return Err(ProviderError::rejected(
                self.provider_name(),
                format!("Sorry, a user named {} already exists.", account.username),
            ));
        }

        state
            .accounts
            .insert(account.username.clone(), account.clone());
        Ok(HostingAccount {
            handle: account.username.clone(),
        })
    }
}
