use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    EventId, EventLogError, EventQuery, NewEvent, ProvisioningEvent, Result, SubjectId,
    store::{EventLog, validate_event},
};

#[derive(Debug, Default)]
struct LogState {
    events: Vec<ProvisioningEvent>,
    claims: HashSet<(SubjectId, String)>,
    next_id: i64,
    unavailable: bool,
    fail_on_append: Option<String>,
}

impl LogState {
    fn check_writable(&self, event: &NewEvent) -> Result<()> {
        if self.unavailable {
            return Err(EventLogError::Unavailable("in-memory log offline".to_string()));
        }
        if self.fail_on_append.as_deref() == Some(event.event_type.as_str()) {
            return Err(EventLogError::Unavailable(format!(
                "append of '{}' refused",
                event.event_type
            )));
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<()> {
        if self.unavailable {
            return Err(EventLogError::Unavailable("in-memory log offline".to_string()));
        }
        Ok(())
    }

    fn push(&mut self, event: NewEvent) -> EventId {
        self.next_id += 1;
        let id = EventId::new(self.next_id);
        self.events.push(ProvisioningEvent {
            id,
            subject_id: event.subject_id,
            event_type: event.event_type,
            message: event.message,
            payload: event.payload,
            created_at: Utc::now(),
        });
        id
    }
}

/// In-memory event log implementation for testing.
///
/// This implementation stores all events in memory and provides
/// the same interface as the PostgreSQL implementation. Claims are
/// checked and recorded under the same write lock as the insert.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    state: Arc<RwLock<LogState>>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns every stored event in append order.
    pub async fn all_events(&self) -> Vec<ProvisioningEvent> {
        self.state.read().await.events.clone()
    }

    /// Makes every read and write fail as if the store were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Makes appends of one event type fail while everything else works.
    pub async fn set_fail_on_append(&self, event_type: Option<&str>) {
        self.state.write().await.fail_on_append = event_type.map(str::to_string);
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: NewEvent) -> Result<EventId> {
        validate_event(&event)?;

        let mut state = self.state.write().await;
        state.check_writable(&event)?;
        Ok(state.push(event))
    }

    async fn append_unique(&self, event: NewEvent) -> Result<EventId> {
        validate_event(&event)?;

        let mut state = self.state.write().await;
        state.check_writable(&event)?;

        let key = (event.subject_id, event.event_type.clone());
        if state.claims.contains(&key) {
            return Err(EventLogError::DuplicateEvent {
                subject_id: key.0,
                event_type: key.1,
            });
        }
        state.claims.insert(key);
        Ok(state.push(event))
    }

    async fn has_occurred(&self, subject_id: SubjectId, event_type: &str) -> Result<bool> {
        let state = self.state.read().await;
        state.check_readable()?;
        Ok(state
            .events
            .iter()
            .any(|e| e.subject_id == subject_id && e.event_type == event_type))
    }

    async fn events_for_subject(&self, subject_id: SubjectId) -> Result<Vec<ProvisioningEvent>> {
        let state = self.state.read().await;
        state.check_readable()?;
        Ok(state
            .events
            .iter()
            .filter(|e| e.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<ProvisioningEvent>> {
        let state = self.state.read().await;
        state.check_readable()?;

        let matching = state.events.iter().filter(|e| {
            if let Some(id) = query.subject_id
                && e.subject_id != id
            {
                return false;
            }
            if let Some(ref types) = query.event_types
                && !types.contains(&e.event_type)
            {
                return false;
            }
            if let Some(after) = query.after_id
                && e.id <= after
            {
                return false;
            }
            if let Some(from) = query.from_timestamp
                && e.created_at < from
            {
                return false;
            }
            if let Some(to) = query.to_timestamp
                && e.created_at > to
            {
                return false;
            }
            true
        });

        let events = match query.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventLogExt;

    fn event(subject: i64, event_type: &str) -> NewEvent {
        NewEvent::new(SubjectId::new(subject), event_type, "test event")
            .payload_raw(serde_json::json!({"test": true}))
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let log = InMemoryEventLog::new();

        let first = log.append(event(1, "provisioning.started")).await.unwrap();
        let second = log.append(event(2, "provisioning.started")).await.unwrap();
        let third = log.append(event(1, "provisioning.completed")).await.unwrap();

        assert!(first < second && second < third);
        assert_eq!(log.event_count().await, 3);
    }

    #[tokio::test]
    async fn append_rejects_malformed_type() {
        let log = InMemoryEventLog::new();
        let result = log.append(event(1, "started")).await;
        assert!(matches!(result, Err(EventLogError::InvalidEvent(_))));
        assert_eq!(log.event_count().await, 0);
    }

    #[tokio::test]
    async fn has_occurred_is_scoped_to_subject_and_type() {
        let log = InMemoryEventLog::new();
        log.append(event(1, "provisioning.started")).await.unwrap();

        assert!(log.has_occurred(SubjectId::new(1), "provisioning.started").await.unwrap());
        assert!(!log.has_occurred(SubjectId::new(1), "provisioning.failed").await.unwrap());
        assert!(!log.has_occurred(SubjectId::new(2), "provisioning.started").await.unwrap());
    }

    #[tokio::test]
    async fn append_unique_allows_one_claim_per_pair() {
        let log = InMemoryEventLog::new();

        log.append_unique(event(1, "provisioning.started")).await.unwrap();
        let second = log.append_unique(event(1, "provisioning.started")).await;
        assert!(matches!(
            second,
            Err(EventLogError::DuplicateEvent { subject_id, .. }) if subject_id == SubjectId::new(1)
        ));

        // Other subjects and other types are unaffected.
        log.append_unique(event(2, "provisioning.started")).await.unwrap();
        log.append_unique(event(1, "provisioning.requeued")).await.unwrap();
        assert_eq!(log.event_count().await, 3);
    }

    #[tokio::test]
    async fn plain_appends_never_conflict() {
        let log = InMemoryEventLog::new();
        log.append(event(1, "payment.succeeded")).await.unwrap();
        log.append(event(1, "payment.succeeded")).await.unwrap();
        assert_eq!(log.event_count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_claims_have_a_single_winner() {
        let log = InMemoryEventLog::new();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let log = log.clone();
                tokio::spawn(async move { log.append_unique(event(9, "provisioning.started")).await })
            })
            .collect();

        let mut winners = 0;
        let mut duplicates = 0;
        for handle in attempts {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) if e.is_duplicate() => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(log.event_count().await, 1);
    }

    #[tokio::test]
    async fn events_for_subject_keeps_append_order() {
        let log = InMemoryEventLog::new();
        log.append(event(1, "provisioning.started")).await.unwrap();
        log.append(event(2, "provisioning.started")).await.unwrap();
        log.append(event(1, "hostingpanel.account.created")).await.unwrap();
        log.append(event(1, "provisioning.completed")).await.unwrap();

        let types = log.event_types_for_subject(SubjectId::new(1)).await.unwrap();
        assert_eq!(
            types,
            vec![
                "provisioning.started",
                "hostingpanel.account.created",
                "provisioning.completed"
            ]
        );
    }

    #[tokio::test]
    async fn query_events_with_filters() {
        let log = InMemoryEventLog::new();
        let first = log.append(event(1, "provisioning.started")).await.unwrap();
        log.append(event(1, "hostinger.register.initiated")).await.unwrap();
        log.append(event(1, "provisioning.failed")).await.unwrap();
        log.append(event(2, "provisioning.failed")).await.unwrap();

        let failures = log
            .query_events(EventQuery::for_event_type("provisioning.failed"))
            .await
            .unwrap();
        assert_eq!(failures.len(), 2);

        let after_first = log
            .query_events(EventQuery::for_subject(SubjectId::new(1)).after_id(first).limit(1))
            .await
            .unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].event_type, "hostinger.register.initiated");
    }

    #[tokio::test]
    async fn first_of_type_returns_earliest() {
        let log = InMemoryEventLog::new();
        log.append(event(1, "payment.succeeded")).await.unwrap();
        let second = log.append(event(1, "payment.succeeded")).await.unwrap();

        let first = log
            .first_of_type(SubjectId::new(1), "payment.succeeded")
            .await
            .unwrap()
            .unwrap();
        assert!(first.id < second);

        let none = log
            .first_of_type(SubjectId::new(1), "provisioning.started")
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn unavailable_log_fails_reads_and_writes() {
        let log = InMemoryEventLog::new();
        log.set_unavailable(true).await;

        assert!(matches!(
            log.append(event(1, "provisioning.started")).await,
            Err(EventLogError::Unavailable(_))
        ));
        assert!(matches!(
            log.has_occurred(SubjectId::new(1), "provisioning.started").await,
            Err(EventLogError::Unavailable(_))
        ));

        log.set_unavailable(false).await;
        assert!(log.append(event(1, "provisioning.started")).await.is_ok());
    }

    #[tokio::test]
    async fn fail_on_append_targets_one_type() {
        let log = InMemoryEventLog::new();
        log.set_fail_on_append(Some("provisioning.completed")).await;

        assert!(log.append(event(1, "provisioning.started")).await.is_ok());
        assert!(matches!(
            log.append(event(1, "provisioning.completed")).await,
            Err(EventLogError::Unavailable(_))
        ));
        assert!(log.has_occurred(SubjectId::new(1), "provisioning.started").await.unwrap());
    }
}
