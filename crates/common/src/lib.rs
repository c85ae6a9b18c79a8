//! Shared types for the provisioning workspace.

pub mod contact;
pub mod types;

pub use contact::RegistrantDetails;
pub use types::{ClientId, RunId, ServiceId, SubjectId};
