//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! provider and OAuth HTTP clients, TCP probing, SSH, and env config.
//!
//! Imports from `crate::domain` and `crate::application` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod digitalocean;
pub mod network;
pub mod oauth;
pub mod ssh;

use std::sync::Arc;

use crate::application::InstallDeps;

/// Production adapters: DigitalOcean API, system `ssh`, TCP probes.
#[must_use]
pub fn default_install_deps() -> InstallDeps {
    InstallDeps {
        connector: Arc::new(digitalocean::DigitalOceanConnector::default()),
        shell: Arc::new(ssh::OpenSshShell::new(Arc::new(
            command_runner::TokioCommandRunner::default(),
        ))),
        prober: Arc::new(network::TokioPortProber::default()),
    }
}
