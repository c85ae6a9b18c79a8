use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::SubjectId;

/// Identifier of a stored event.
///
/// Assigned by the log on append and strictly increasing in append order,
/// so it doubles as the ordering key for a subject's history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    /// Creates an event ID from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EventId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A timestamped fact about a provisioning subject.
///
/// Events are never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningEvent {
    pub id: EventId,

    pub subject_id: SubjectId,

    /// Free-form dotted type, e.g. `provisioning.started`.
    pub event_type: String,

    /// Human-readable description for operators.
    pub message: String,

    /// Opaque structured data attached by the writer.
    pub payload: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl ProvisioningEvent {
    /// Deserializes the payload into a typed value.
    ///
    /// Returns `Ok(None)` when the event carries no payload.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.payload
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// Returns a top-level string field of the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }
}

/// An event that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub subject_id: SubjectId,
    pub event_type: String,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

impl NewEvent {
    /// Creates an event without payload.
    pub fn new(
        subject_id: SubjectId,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject_id,
            event_type: event_type.into(),
            message: message.into(),
            payload: None,
        }
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}
