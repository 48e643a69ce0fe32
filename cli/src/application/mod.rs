//! Application layer: port trait definitions, the job registry, and use-case
//! orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod ports;
pub mod registry;
pub mod services;

pub use ports::{
    AccountKey, Authorizer, CloudConnector, CloudProvider, CommandRunner, InstanceSpec,
    PortProber, ProbeOutcome, ProgressReporter, RemoteShell, SilentReporter,
};
pub use registry::{Job, JobId, JobRegistry};
pub use services::install::{InstallDeps, InstallOutcome, InstallSettings, Installer};
