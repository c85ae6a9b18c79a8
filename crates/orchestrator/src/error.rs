//! Orchestrator error types.

use domain::{DirectoryError, SubjectError, SubjectId, SubjectStatus};
use event_log::EventLogError;
use providers::ProviderError;
use thiserror::Error;

/// Errors that can occur during provisioning.
///
/// Inside a run, provider and directory errors become a recorded step
/// failure; only storage errors reach the caller of
/// [`Orchestrator::run`](crate::Orchestrator::run).
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// A registrar or hosting panel call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Client or plan data could not be resolved.
    #[error("Directory lookup failed: {0}")]
    Directory(#[from] DirectoryError),

    /// Event log error.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// Subject store error.
    #[error("Subject store error: {0}")]
    Subject(#[from] SubjectError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Subject not found.
    #[error("Subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// Only failed subjects can be requeued.
    #[error("Subject {subject_id} is {status}; only failed subjects can be requeued")]
    NotRequeueable {
        subject_id: SubjectId,
        status: SubjectStatus,
    },

    /// The failed subject already has a retry.
    #[error("Subject {0} has already been requeued")]
    AlreadyRequeued(SubjectId),

    /// The subject is not pending with a claimed, unfinished run.
    #[error("Subject {0} has no aborted run to recover")]
    NotAborted(SubjectId),
}

impl ProvisioningError {
    /// Returns true if the event log or subject store failed.
    ///
    /// Such a failure cannot be recorded durably, so the run aborts without
    /// marking the subject failed and must be re-triggered later.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ProvisioningError::EventLog(_)
                | ProvisioningError::Subject(_)
                | ProvisioningError::Serialization(_)
        )
    }

    /// Failure class recorded in `provisioning.failed`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningError::Provider(e) => e.kind().as_str(),
            ProvisioningError::Directory(_) => "directory_lookup",
            ProvisioningError::EventLog(_)
            | ProvisioningError::Subject(_)
            | ProvisioningError::Serialization(_) => "storage",
            ProvisioningError::SubjectNotFound(_) => "subject_not_found",
            ProvisioningError::NotRequeueable { .. }
            | ProvisioningError::AlreadyRequeued(_)
            | ProvisioningError::NotAborted(_) => "invalid_request",
        }
    }

    /// Returns true if re-running the workflow later may succeed without
    /// operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProvisioningError::Provider(e) => e.is_retryable(),
            ProvisioningError::Directory(e) => !e.is_not_found(),
            other => other.is_storage(),
        }
    }

    /// The message a provider returned, verbatim.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ProvisioningError::Provider(e) => Some(e.message()),
            _ => None,
        }
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, ProvisioningError>;
