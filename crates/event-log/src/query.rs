use chrono::{DateTime, Utc};

use crate::{EventId, SubjectId};

/// Builder for filtering the event log.
///
/// Used by audit reads; the orchestrator itself only needs
/// [`EventLog::has_occurred`](crate::EventLog::has_occurred) and
/// [`EventLog::events_for_subject`](crate::EventLog::events_for_subject).
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by subject.
    pub subject_id: Option<SubjectId>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<String>>,

    /// Only events with an ID greater than this one.
    pub after_id: Option<EventId>,

    /// Filter by events created at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by events created at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific subject.
    pub fn for_subject(subject_id: SubjectId) -> Self {
        Self {
            subject_id: Some(subject_id),
            ..Default::default()
        }
    }

    /// Creates a query for events of a specific type.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    /// Filters by subject.
    pub fn subject_id(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    /// Filters by a single event type, adding to any existing types.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types
            .get_or_insert_with(Vec::new)
            .push(event_type.into());
        self
    }

    /// Filters by multiple event types.
    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Resumes after a previously seen event.
    pub fn after_id(mut self, id: EventId) -> Self {
        self.after_id = Some(id);
        self
    }

    /// Filters by minimum creation time (inclusive).
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters by maximum creation time (inclusive).
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
