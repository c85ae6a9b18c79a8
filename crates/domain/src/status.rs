//! Subject status machine and operation types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted lifecycle status of a provisioning subject.
///
/// State transitions:
/// ```text
/// PendingPayment ──► PendingProvisioning ──┬──► Active ──┐
///       │                    │             └──► Failed ──┤
///       └────────────────────┴───────────────────────────┴──► Cancelled
/// ```
///
/// This is a coarse projection of a run; the event log holds the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    /// Created, invoice not yet paid.
    #[default]
    PendingPayment,

    /// Paid and waiting for an orchestration run.
    PendingProvisioning,

    /// Provisioned successfully.
    Active,

    /// A run ended in failure; see the event log for the step.
    Failed,

    /// Cancelled by an operator or the client (terminal state).
    Cancelled,
}

impl SubjectStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [SubjectStatus; 5] = [
        SubjectStatus::PendingPayment,
        SubjectStatus::PendingProvisioning,
        SubjectStatus::Active,
        SubjectStatus::Failed,
        SubjectStatus::Cancelled,
    ];

    /// Returns true if a subject in this status may move to `next`.
    pub fn can_transition_to(&self, next: SubjectStatus) -> bool {
        use SubjectStatus::*;
        matches!(
            (self, next),
            (PendingPayment, PendingProvisioning)
                | (PendingPayment, Cancelled)
                | (PendingProvisioning, Active)
                | (PendingProvisioning, Failed)
                | (PendingProvisioning, Cancelled)
                | (Active, Cancelled)
                | (Failed, Cancelled)
        )
    }

    /// Statuses from which `self` can be reached.
    pub fn predecessors(&self) -> Vec<SubjectStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(*self))
            .collect()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubjectStatus::Cancelled)
    }

    /// Returns the storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::PendingPayment => "pending_payment",
            SubjectStatus::PendingProvisioning => "pending_provisioning",
            SubjectStatus::Active => "active",
            SubjectStatus::Failed => "failed",
            SubjectStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown subject status '{s}'"))
    }
}

/// What the registrar step does for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Register a new domain.
    Register,
    /// Transfer a domain in from another registrar.
    Transfer,
    /// The client already owns the domain; no registrar call.
    #[serde(rename = "existing")]
    UseExisting,
}

impl OperationType {
    /// Returns true if the run must call the registrar.
    pub fn requires_registrar(&self) -> bool {
        !matches!(self, OperationType::UseExisting)
    }

    /// Returns the storage name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Register => "register",
            OperationType::Transfer => "transfer",
            OperationType::UseExisting => "existing",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(OperationType::Register),
            "transfer" => Ok(OperationType::Transfer),
            "existing" => Ok(OperationType::UseExisting),
            other => Err(format!("unknown operation type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_subjects_move_to_provisioning() {
        assert!(SubjectStatus::PendingPayment.can_transition_to(SubjectStatus::PendingProvisioning));
        assert!(SubjectStatus::PendingProvisioning.can_transition_to(SubjectStatus::Active));
        assert!(SubjectStatus::PendingProvisioning.can_transition_to(SubjectStatus::Failed));
    }

    #[test]
    fn runs_cannot_skip_or_rewind() {
        assert!(!SubjectStatus::PendingPayment.can_transition_to(SubjectStatus::Active));
        assert!(!SubjectStatus::Failed.can_transition_to(SubjectStatus::Active));
        assert!(!SubjectStatus::Active.can_transition_to(SubjectStatus::PendingProvisioning));
        assert!(!SubjectStatus::Failed.can_transition_to(SubjectStatus::PendingProvisioning));
    }

    #[test]
    fn cancelled_is_terminal() {
        assert!(SubjectStatus::Cancelled.is_terminal());
        for next in SubjectStatus::ALL {
            assert!(!SubjectStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn predecessors_of_active_and_failed() {
        assert_eq!(
            SubjectStatus::Active.predecessors(),
            vec![SubjectStatus::PendingProvisioning]
        );
        assert_eq!(
            SubjectStatus::Cancelled.predecessors(),
            vec![
                SubjectStatus::PendingPayment,
                SubjectStatus::PendingProvisioning,
                SubjectStatus::Active,
                SubjectStatus::Failed,
            ]
        );
    }

    #[test]
    fn storage_names_parse_back() {
        for status in SubjectStatus::ALL {
            assert_eq!(status.as_str().parse::<SubjectStatus>().unwrap(), status);
        }
        assert!("pending_registration".parse::<SubjectStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&SubjectStatus::PendingProvisioning).unwrap(),
            "\"pending_provisioning\""
        );
    }

    #[test]
    fn operation_types() {
        assert!(OperationType::Register.requires_registrar());
        assert!(OperationType::Transfer.requires_registrar());
        assert!(!OperationType::UseExisting.requires_registrar());
        assert_eq!("existing".parse::<OperationType>().unwrap(), OperationType::UseExisting);
        assert_eq!(serde_json::to_string(&OperationType::UseExisting).unwrap(), "\"existing\"");
    }
}
