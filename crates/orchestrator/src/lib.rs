//! Provisioning orchestrator.
//!
//! Turns a paid subject into live infrastructure:
//! 1. Claim the subject (`provisioning.started`, at most once)
//! 2. Register or transfer the domain (skipped for existing domains)
//! 3. Create the hosting account
//! 4. Mark the subject `active` or `failed`
//!
//! Steps are never retried inside a run and a failed registration is never
//! rolled back; failures are recorded for an operator, who may requeue the
//! subject.

pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use config::{DispatcherConfig, OrchestratorConfig};
pub use dispatcher::{LaunchError, ProvisioningDispatcher, ProvisioningLauncher, RunExecutor};
pub use error::{ProvisioningError, Result};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use state::{RunState, RunSummary};
