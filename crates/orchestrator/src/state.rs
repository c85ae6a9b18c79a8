//! Run state machine and event replay.

use chrono::{DateTime, Utc};
use common::{RunId, SubjectId};
use event_log::ProvisioningEvent;
use serde::{Deserialize, Serialize};

use crate::events::{
    AccountCreatedPayload, FailedPayload, HOSTING_ACCOUNT_CREATED, PROVISIONING_COMPLETED,
    PROVISIONING_FAILED, PROVISIONING_REQUEUED, PROVISIONING_STARTED, REGISTRAR_STEP_SKIPPED,
    RegistrarInitiatedPayload, RegistrarSkippedPayload, RequeuedPayload, StartedPayload,
    is_registrar_initiated,
};

/// The state of a provisioning run.
///
/// State transitions:
/// ```text
/// NotStarted ──► Started ──► RegistrarStepDone ──► HostingStepDone ──► Completed
///                   │               │                     │
///                   └───────────────┴─────────────────────┴──► Failed
/// ```
///
/// `RegistrarStepDone` is only reached when the subject needed a registrar
/// call; existing domains go from `Started` straight to `HostingStepDone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    Started,
    RegistrarStepDone,
    HostingStepDone,
    /// Terminal.
    Completed,
    /// Terminal.
    Failed,
}

impl RunState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Returns true if the run claimed its subject.
    pub fn has_started(&self) -> bool {
        !matches!(self, RunState::NotStarted)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "NotStarted",
            RunState::Started => "Started",
            RunState::RegistrarStepDone => "RegistrarStepDone",
            RunState::HostingStepDone => "HostingStepDone",
            RunState::Completed => "Completed",
            RunState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a subject's event log says about its run, for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub subject_id: SubjectId,
    pub state: RunState,
    pub run_id: Option<RunId>,
    pub provider_order_id: Option<String>,
    pub hosting_username: Option<String>,
    pub failed_step: Option<String>,
    pub failure_message: Option<String>,
    pub retryable: bool,
    pub requires_manual_reconciliation: bool,
    pub requeued_as: Option<SubjectId>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn empty(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            state: RunState::NotStarted,
            run_id: None,
            provider_order_id: None,
            hosting_username: None,
            failed_step: None,
            failure_message: None,
            retryable: false,
            requires_manual_reconciliation: false,
            requeued_as: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Folds a subject's events, in append order, into a summary.
    ///
    /// Events of other subjects and unknown types are ignored.
    pub fn from_events(subject_id: SubjectId, events: &[ProvisioningEvent]) -> Self {
        let mut summary = Self::empty(subject_id);
        for event in events.iter().filter(|e| e.subject_id == subject_id) {
            summary.apply(event);
        }
        summary
    }

    fn apply(&mut self, event: &ProvisioningEvent) {
        match event.event_type.as_str() {
            PROVISIONING_STARTED => {
                self.state = RunState::Started;
                self.started_at = Some(event.created_at);
                self.run_id = event
                    .payload_as::<StartedPayload>()
                    .ok()
                    .flatten()
                    .map(|p| p.run_id);
            }
            REGISTRAR_STEP_SKIPPED => {
                if let Ok(Some(payload)) = event.payload_as::<RegistrarSkippedPayload>() {
                    self.provider_order_id = Some(payload.order_id);
                }
            }
            HOSTING_ACCOUNT_CREATED => {
                self.state = RunState::HostingStepDone;
                if let Ok(Some(payload)) = event.payload_as::<AccountCreatedPayload>() {
                    self.hosting_username = Some(payload.username);
                }
            }
            PROVISIONING_COMPLETED => {
                self.state = RunState::Completed;
                self.finished_at = Some(event.created_at);
            }
            PROVISIONING_FAILED => {
                self.state = RunState::Failed;
                self.finished_at = Some(event.created_at);
                self.failure_message = Some(event.message.clone());
                if let Ok(Some(payload)) = event.payload_as::<FailedPayload>() {
                    self.failed_step = Some(payload.step);
                    self.failure_message = Some(payload.error);
                    self.retryable = payload.retryable;
                    self.requires_manual_reconciliation = payload.requires_manual_reconciliation;
                    if payload.provider_order_id.is_some() {
                        self.provider_order_id = payload.provider_order_id;
                    }
                }
            }
            PROVISIONING_REQUEUED => {
                if let Ok(Some(payload)) = event.payload_as::<RequeuedPayload>() {
                    self.requeued_as = Some(payload.new_subject_id);
                }
            }
            other if is_registrar_initiated(other) => {
                self.state = RunState::RegistrarStepDone;
                if let Ok(Some(payload)) = event.payload_as::<RegistrarInitiatedPayload>() {
                    self.provider_order_id = Some(payload.order_id);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use event_log::EventId;
    use serde_json::json;

    fn event(id: i64, event_type: &str, payload: Option<serde_json::Value>) -> ProvisioningEvent {
        ProvisioningEvent {
            id: EventId::new(id),
            subject_id: SubjectId::new(42),
            event_type: event_type.to_string(),
            message: format!("{event_type} message"),
            payload,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn default_state_is_not_started() {
        assert_eq!(RunState::default(), RunState::NotStarted);
        assert!(!RunState::NotStarted.has_started());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::HostingStepDone.is_terminal());
    }

    #[test]
    fn empty_history_is_not_started() {
        let summary = RunSummary::from_events(SubjectId::new(42), &[]);
        assert_eq!(summary.state, RunState::NotStarted);
        assert!(summary.run_id.is_none());
    }

    #[test]
    fn completed_run() {
        let run_id = RunId::new();
        let events = vec![
            event(1, "payment.succeeded", None),
            event(
                2,
                PROVISIONING_STARTED,
                Some(json!({"run_id": run_id, "operation": "register"})),
            ),
            event(
                3,
                "hostinger.register.initiated",
                Some(json!({"provider": "hostinger", "operation": "register", "order_id": "ORD-1"})),
            ),
            event(
                4,
                HOSTING_ACCOUNT_CREATED,
                Some(json!({"provider": "whm", "username": "user42", "plan": "p", "handle": "user42"})),
            ),
            event(5, PROVISIONING_COMPLETED, Some(json!({"run_id": run_id}))),
        ];

        let summary = RunSummary::from_events(SubjectId::new(42), &events);
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.run_id, Some(run_id));
        assert_eq!(summary.provider_order_id.as_deref(), Some("ORD-1"));
        assert_eq!(summary.hosting_username.as_deref(), Some("user42"));
        assert!(summary.finished_at.is_some());
        assert!(summary.failed_step.is_none());
    }

    #[test]
    fn failed_after_registration() {
        let events = vec![
            event(1, PROVISIONING_STARTED, None),
            event(
                2,
                "hostinger.register.initiated",
                Some(json!({"provider": "hostinger", "operation": "register", "order_id": "ORD-7"})),
            ),
            event(
                3,
                PROVISIONING_FAILED,
                Some(json!({
                    "run_id": RunId::new(),
                    "step": "hosting_account",
                    "error_kind": "provider_unavailable",
                    "error": "whm unavailable: 503",
                    "retryable": true,
                    "requires_manual_reconciliation": true,
                    "provider_order_id": "ORD-7"
                })),
            ),
        ];

        let summary = RunSummary::from_events(SubjectId::new(42), &events);
        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.failed_step.as_deref(), Some("hosting_account"));
        assert_eq!(summary.failure_message.as_deref(), Some("whm unavailable: 503"));
        assert!(summary.retryable);
        assert!(summary.requires_manual_reconciliation);
        assert_eq!(summary.provider_order_id.as_deref(), Some("ORD-7"));
    }

    #[test]
    fn unstructured_failure_keeps_message() {
        let events = vec![
            event(1, PROVISIONING_STARTED, None),
            event(2, PROVISIONING_FAILED, None),
        ];
        let summary = RunSummary::from_events(SubjectId::new(42), &events);
        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(
            summary.failure_message.as_deref(),
            Some("provisioning.failed message")
        );
    }

    #[test]
    fn requeue_is_reported() {
        let events = vec![
            event(1, PROVISIONING_STARTED, None),
            event(2, PROVISIONING_FAILED, None),
            event(
                3,
                PROVISIONING_REQUEUED,
                Some(json!({"new_subject_id": 43, "lineage_root": 42})),
            ),
        ];
        let summary = RunSummary::from_events(SubjectId::new(42), &events);
        assert_eq!(summary.requeued_as, Some(SubjectId::new(43)));
        assert_eq!(summary.state, RunState::Failed);
    }
}
