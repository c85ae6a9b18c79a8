use thiserror::Error;

use crate::SubjectId;

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// A claimed event of this type already exists for the subject.
    ///
    /// Raised by [`EventLog::append_unique`](crate::EventLog::append_unique)
    /// when another writer won the claim.
    #[error("Event '{event_type}' already claimed for subject {subject_id}")]
    DuplicateEvent {
        subject_id: SubjectId,
        event_type: String,
    },

    /// The event was rejected before reaching storage.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The backing store cannot be reached.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventLogError {
    /// Returns true if the error means another writer already holds the claim.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, EventLogError::DuplicateEvent { .. })
    }
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;
