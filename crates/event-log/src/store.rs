use async_trait::async_trait;

use crate::{EventId, EventLogError, EventQuery, NewEvent, ProvisioningEvent, Result, SubjectId};

/// Core trait for event log implementations.
///
/// The log is append-only: implementations never update or delete entries.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event and returns its assigned ID.
    ///
    /// Never overwrites a prior entry.
    async fn append(&self, event: NewEvent) -> Result<EventId>;

    /// Appends an event as a claim on its `(subject, type)` pair.
    ///
    /// At most one claimed event may exist per pair. The check and the insert
    /// are a single atomic operation, so of several concurrent callers exactly
    /// one succeeds and the others get [`EventLogError::DuplicateEvent`].
    async fn append_unique(&self, event: NewEvent) -> Result<EventId>;

    /// Returns true if any event of `event_type` exists for the subject.
    ///
    /// Never observes a half-written append.
    async fn has_occurred(&self, subject_id: SubjectId, event_type: &str) -> Result<bool>;

    /// Retrieves a subject's full history in append order.
    async fn events_for_subject(&self, subject_id: SubjectId) -> Result<Vec<ProvisioningEvent>>;

    /// Retrieves events matching a query, in append order.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<ProvisioningEvent>>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Returns the earliest event of a type for a subject.
    async fn first_of_type(
        &self,
        subject_id: SubjectId,
        event_type: &str,
    ) -> Result<Option<ProvisioningEvent>> {
        let events = self
            .query_events(
                EventQuery::for_subject(subject_id)
                    .event_type(event_type)
                    .limit(1),
            )
            .await?;
        Ok(events.into_iter().next())
    }

    /// Returns the types of a subject's events in append order.
    async fn event_types_for_subject(&self, subject_id: SubjectId) -> Result<Vec<String>> {
        Ok(self
            .events_for_subject(subject_id)
            .await?
            .into_iter()
            .map(|event| event.event_type)
            .collect())
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}

/// Validates an event before appending.
///
/// Types are dotted lowercase paths (`provisioning.started`,
/// `hostinger.register.initiated`): at least two non-empty segments made of
/// ASCII alphanumerics, `_` or `-`.
pub fn validate_event(event: &NewEvent) -> std::result::Result<(), EventLogError> {
    let event_type = event.event_type.as_str();
    let segments: Vec<&str> = event_type.split('.').collect();

    if segments.len() < 2 {
        return Err(EventLogError::InvalidEvent(format!(
            "event type '{event_type}' must be a dotted path"
        )));
    }

    let well_formed = segments.iter().all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    });
    if !well_formed {
        return Err(EventLogError::InvalidEvent(format!(
            "event type '{event_type}' has an empty or malformed segment"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> NewEvent {
        NewEvent::new(SubjectId::new(1), event_type, "m")
    }

    #[test]
    fn accepts_dotted_types() {
        assert!(validate_event(&event("provisioning.started")).is_ok());
        assert!(validate_event(&event("hostinger.register.initiated")).is_ok());
        assert!(validate_event(&event("dns.setup.skipped")).is_ok());
        assert!(validate_event(&event("my-panel.account_v2.created")).is_ok());
    }

    #[test]
    fn rejects_undotted_or_malformed_types() {
        for bad in ["", "started", "provisioning.", ".started", "a..b", "Provisioning.Started", "a.b c"] {
            assert!(
                matches!(validate_event(&event(bad)), Err(EventLogError::InvalidEvent(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
