//! Provisioning client adapters.
//!
//! The orchestrator only sees the [`DomainRegistrar`] and
//! [`HostingAccountProvisioner`] capabilities. Live implementations:
//! - [`HostingerRegistrar`]: bearer-token JSON API
//! - [`WhmProvisioner`]: WHM `createacct` over the JSON API
//!
//! In-memory doubles of both live beside the traits.

pub mod config;
pub mod error;
pub mod hosting;
pub mod hostinger;
mod http;
pub mod registrar;
pub mod secret;
pub mod whm;

pub use config::{HostingPanelConfig, RegistrarConfig};
pub use error::{ProviderError, ProviderErrorKind};
pub use hosting::{HostingAccount, HostingAccountProvisioner, InMemoryHostingPanel, NewHostingAccount};
pub use hostinger::HostingerRegistrar;
pub use registrar::{DomainRegistrar, InMemoryRegistrar, RegistrarOrder};
pub use secret::OneTimePassword;
pub use whm::WhmProvisioner;
