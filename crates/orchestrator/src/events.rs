//! Event types and payloads written by a provisioning run.

use common::{RunId, SubjectId};
use serde::{Deserialize, Serialize};

/// The run's claim on its subject. Written at most once per subject.
pub const PROVISIONING_STARTED: &str = "provisioning.started";
pub const PROVISIONING_COMPLETED: &str = "provisioning.completed";
pub const PROVISIONING_FAILED: &str = "provisioning.failed";
/// Written on a failed subject when an operator retries it.
pub const PROVISIONING_REQUEUED: &str = "provisioning.requeued";
/// The client already owns the domain.
pub const DNS_SETUP_SKIPPED: &str = "dns.setup.skipped";
/// An earlier run of the same lineage already registered the domain.
pub const REGISTRAR_STEP_SKIPPED: &str = "registrar.step.skipped";
pub const HOSTING_ACCOUNT_CREATED: &str = "hostingpanel.account.created";
/// Written by triggers, not by runs.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";

pub const STEP_REGISTRAR: &str = "registrar";
pub const STEP_HOSTING_ACCOUNT: &str = "hosting_account";
/// Recording the run's outcome after both steps.
pub const STEP_FINALIZE: &str = "finalize";

/// `<provider>.<operation>.initiated`, e.g. `hostinger.register.initiated`.
pub fn registrar_initiated(provider: &str, operation: &str) -> String {
    format!("{provider}.{operation}.initiated")
}

/// Returns true for `<provider>.<operation>.initiated` events.
pub fn is_registrar_initiated(event_type: &str) -> bool {
    let mut segments = event_type.split('.');
    matches!(
        (segments.next(), segments.next(), segments.next(), segments.next()),
        (Some(_), Some("register" | "transfer"), Some("initiated"), None)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedPayload {
    pub run_id: RunId,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<SubjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarInitiatedPayload {
    pub provider: String,
    pub operation: String,
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarSkippedPayload {
    pub provider: String,
    pub order_id: String,
    /// The lineage member whose run registered the domain.
    pub registered_by: SubjectId,
}

/// Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreatedPayload {
    pub provider: String,
    pub username: String,
    pub plan: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPayload {
    pub run_id: RunId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPayload {
    pub run_id: RunId,
    pub step: String,
    pub error_kind: String,
    pub error: String,
    /// The provider's own reason, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message: Option<String>,
    pub retryable: bool,
    /// A domain order stands that no hosting account was created for.
    pub requires_manual_reconciliation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequeuedPayload {
    pub new_subject_id: SubjectId,
    pub lineage_root: SubjectId,
}
