//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod auth;
pub mod bootstrap;
pub mod credentials;
pub mod error;
pub mod instance;
pub mod retry;
pub mod token;

pub use auth::BearerCredential;
pub use credentials::CredentialPair;
pub use error::{DeployError, JobError};
pub use instance::{InstanceAddresses, InstanceConfig, InstanceHandle};
pub use retry::{Backoff, RetryPolicies, RetryPolicy};
