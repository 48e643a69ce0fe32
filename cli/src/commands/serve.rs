//! Serve command: run the installer web front end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::application::{InstallDeps, Installer, JobRegistry};
use crate::infra::config::{install_settings, load_server_config};
use crate::infra::oauth::{DEFAULT_OAUTH_BASE, DigitalOceanAuthorizer, OAuthApp};
use crate::server;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding INSTALLER_LISTEN_ADDR
    #[arg(long)]
    pub listen: Option<SocketAddr>,
}

/// Entry point for `chaincore-installer serve`.
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, the listener
/// cannot be bound, or the server fails.
pub async fn run(args: &ServeArgs, deps: InstallDeps) -> Result<()> {
    let mut config = load_server_config()?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let settings = install_settings(&config)?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        public_url = %config.public_url,
        job_timeout_secs = config.job_timeout_secs,
        job_retention_secs = ?config.job_retention_secs,
        "configuration loaded",
    );

    let authorizer = DigitalOceanAuthorizer::new(
        DEFAULT_OAUTH_BASE,
        OAuthApp {
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            redirect_uri: config.redirect_uri(),
        },
    )?;

    let shutdown = CancellationToken::new();
    let installer = Arc::new(Installer::new(
        Arc::new(JobRegistry::new()),
        deps,
        Arc::new(authorizer),
        settings,
        shutdown.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tokio::spawn(super::cancel_on_ctrl_c(shutdown.clone()));
    server::serve(
        listener,
        installer,
        config.job_retention_secs.map(Duration::from_secs),
        shutdown,
    )
    .await
}
