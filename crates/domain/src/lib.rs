//! Provisioning subject model.
//!
//! This crate provides:
//! - [`ProvisioningSubject`], the mutable record of a domain or hosting order
//! - [`SubjectStatus`] and its transition rules
//! - [`SubjectStore`] with in-memory and PostgreSQL backends
//! - [`AccountDirectory`], read access to client contact data and plan names

pub mod directory;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod status;
pub mod store;
pub mod subject;

pub use common::{ClientId, RegistrantDetails, ServiceId, SubjectId};
pub use directory::{AccountDirectory, InMemoryDirectory, PostgresDirectory};
pub use error::{DirectoryError, Result, SubjectError};
pub use memory::InMemorySubjectStore;
pub use postgres::PostgresSubjectStore;
pub use status::{OperationType, SubjectStatus};
pub use store::SubjectStore;
pub use subject::{NewSubject, ProvisioningSubject};
