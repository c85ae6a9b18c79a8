//! Append-only event log for provisioning subjects.
//!
//! The log is both the audit trail operators read and the source of truth
//! for "did step X already run for subject Y". Its claim primitive,
//! [`EventLog::append_unique`], is what makes the orchestrator's idempotency
//! gate atomic.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::SubjectId;
pub use error::{EventLogError, Result};
pub use event::{EventId, NewEvent, ProvisioningEvent};
pub use memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;
pub use query::EventQuery;
pub use store::{EventLog, EventLogExt, validate_event};
