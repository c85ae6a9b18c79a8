use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ClientId, OperationType, ServiceId, SubjectId, SubjectStatus};

/// A provisionable unit: a domain registration, transfer, or hosting account.
///
/// `provider_name` and `provider_order_id` are set together, and only once the
/// registrar step of this subject's run has succeeded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSubject {
    pub id: SubjectId,
    pub client_id: ClientId,
    pub service_id: ServiceId,
    /// Domain name (or account identifier) being provisioned.
    pub name: String,
    pub operation_type: OperationType,
    pub status: SubjectStatus,
    pub provider_name: Option<String>,
    pub provider_order_id: Option<String>,
    /// EPP code for transfers. Never serialized.
    #[serde(skip_serializing, default)]
    pub auth_code: Option<String>,
    /// The first subject of the lineage when this one is an operator retry.
    pub retry_of: Option<SubjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningSubject {
    /// The subject whose ID anchors derived values (such as the hosting
    /// username) across retries.
    pub fn lineage_root(&self) -> SubjectId {
        self.retry_of.unwrap_or(self.id)
    }

    /// Returns true if the registrar step recorded an order for this subject.
    pub fn has_provider_order(&self) -> bool {
        self.provider_order_id.is_some()
    }
}

impl fmt::Debug for ProvisioningSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningSubject")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("service_id", &self.service_id)
            .field("name", &self.name)
            .field("operation_type", &self.operation_type)
            .field("status", &self.status)
            .field("provider_name", &self.provider_name)
            .field("provider_order_id", &self.provider_order_id)
            .field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
            .field("retry_of", &self.retry_of)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields for creating a subject; the store assigns the ID and timestamps.
#[derive(Clone)]
pub struct NewSubject {
    pub client_id: ClientId,
    pub service_id: ServiceId,
    pub name: String,
    pub operation_type: OperationType,
    pub status: SubjectStatus,
    pub auth_code: Option<String>,
    pub retry_of: Option<SubjectId>,
}

impl NewSubject {
    /// Creates a subject awaiting payment.
    pub fn new(
        client_id: ClientId,
        service_id: ServiceId,
        name: impl Into<String>,
        operation_type: OperationType,
    ) -> Self {
        Self {
            client_id,
            service_id,
            name: name.into(),
            operation_type,
            status: SubjectStatus::PendingPayment,
            auth_code: None,
            retry_of: None,
        }
    }

    /// Sets the initial status.
    pub fn status(mut self, status: SubjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the transfer auth code.
    pub fn auth_code(mut self, auth_code: impl Into<String>) -> Self {
        self.auth_code = Some(auth_code.into());
        self
    }

    /// Marks the subject as a retry of an earlier lineage.
    pub fn retry_of(mut self, root: SubjectId) -> Self {
        self.retry_of = Some(root);
        self
    }
}

impl fmt::Debug for NewSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSubject")
            .field("client_id", &self.client_id)
            .field("service_id", &self.service_id)
            .field("name", &self.name)
            .field("operation_type", &self.operation_type)
            .field("status", &self.status)
            .field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
            .field("retry_of", &self.retry_of)
            .finish()
    }
}
