//! Subject store and directory error types.

use thiserror::Error;

use crate::{ClientId, ServiceId, SubjectId, SubjectStatus};

/// Errors that can occur when reading or updating provisioning subjects.
#[derive(Debug, Error)]
pub enum SubjectError {
    /// No subject exists with this ID.
    #[error("Subject not found: {0}")]
    NotFound(SubjectId),

    /// The requested status change is not allowed from the current status.
    #[error("Invalid status transition for subject {subject_id}: {from} -> {to}")]
    InvalidTransition {
        subject_id: SubjectId,
        from: SubjectStatus,
        to: SubjectStatus,
    },

    /// A stored value could not be mapped back to the model.
    #[error("Corrupt subject row: {0}")]
    Corrupt(String),

    /// The backing store cannot be reached.
    #[error("Subject store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors raised while resolving client or plan data.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceId),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DirectoryError {
    /// Returns true if the record is missing rather than unreachable.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DirectoryError::ClientNotFound(_) | DirectoryError::ServiceNotFound(_)
        )
    }
}

/// Result type for subject store operations.
pub type Result<T> = std::result::Result<T, SubjectError>;
