//! Deploy command: provision a droplet and bootstrap Chain Core on it from
//! the terminal, using a personal access token.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use installer_common::JobState;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ProgressReporter, SilentReporter};
use crate::application::services::install::{
    InstallDeps, InstallOutcome, InstallSettings, ReportingObserver, install, run_bounded,
};
use crate::domain::bootstrap::SERVICE_PORT;
use crate::domain::instance::{
    DEFAULT_INSTANCE_NAME, DEFAULT_REGION, DEFAULT_SIZE, DEFAULT_VOLUME_GB,
};
use crate::domain::{BearerCredential, InstanceConfig};
use crate::output::{OutputContext, TerminalReporter, json};

/// Arguments for the deploy command.
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// DigitalOcean personal access token with read and write scope
    #[arg(long, env = "DIGITALOCEAN_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Droplet name
    #[arg(long, default_value = DEFAULT_INSTANCE_NAME)]
    pub name: String,

    /// Region slug
    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    /// Droplet size slug
    #[arg(long, default_value = DEFAULT_SIZE)]
    pub size: String,

    /// Block storage volume size in GB
    #[arg(long, default_value_t = DEFAULT_VOLUME_GB)]
    pub volume_gb: u64,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 1800)]
    pub timeout_secs: u64,
}

impl DeployArgs {
    fn instance(&self) -> InstanceConfig {
        InstanceConfig {
            name: self.name.clone(),
            region: self.region.clone(),
            size: self.size.clone(),
            volume_gb: self.volume_gb,
            ..InstanceConfig::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct DeployReport<'a> {
    state: JobState,
    droplet_id: u64,
    ip_address: &'a str,
    ipv6_address: &'a str,
    client_token: &'a str,
    dashboard_url: String,
}

/// Entry point for `chaincore-installer deploy`.
///
/// # Errors
///
/// Returns an error if the token is missing, the droplet settings are
/// invalid, or any install step fails.
pub async fn run(ctx: &OutputContext, args: &DeployArgs, deps: &InstallDeps, json: bool) -> Result<()> {
    let token = args
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .context("missing access token: pass --token or set DIGITALOCEAN_ACCESS_TOKEN")?;
    anyhow::ensure!(args.timeout_secs > 0, "--timeout-secs must be positive");

    let config = args.instance();
    config.validate()?;
    let settings = InstallSettings {
        instance: config.clone(),
        job_timeout: Duration::from_secs(args.timeout_secs),
        ..InstallSettings::default()
    };
    let credential = BearerCredential::personal(token);

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn(super::cancel_on_ctrl_c(cancel.clone()));

    let terminal = TerminalReporter::new(ctx);
    let reporter: &dyn ProgressReporter = if json { &SilentReporter } else { &terminal };
    if !json {
        ctx.header(&format!("Deploying Chain Core to {} ({})", config.name, config.region));
    }

    let deadline = Instant::now() + settings.job_timeout;
    let outcome = run_bounded(
        &cancel,
        settings.job_timeout,
        install(
            deps,
            &credential,
            &config,
            &settings,
            &cancel,
            deadline,
            &ReportingObserver(reporter),
            reporter,
        ),
    )
    .await;

    // Stop listening for Ctrl-C.
    cancel.cancel();
    let _ = ctrl_c.await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            terminal.abort();
            return Err(e.into());
        }
    };
    reporter.success("Chain Core is ready");
    print_outcome(ctx, &outcome, json)
}

fn print_outcome(ctx: &OutputContext, outcome: &InstallOutcome, json: bool) -> Result<()> {
    let report = DeployReport {
        state: JobState::Done,
        droplet_id: outcome.droplet_id,
        ip_address: &outcome.ipv4,
        ipv6_address: &outcome.ipv6,
        client_token: &outcome.client_token,
        dashboard_url: dashboard_url(outcome),
    };
    if json {
        return json::print(&report);
    }
    println!();
    ctx.kv("Droplet     ", &report.droplet_id.to_string());
    ctx.kv("IPv4        ", report.ip_address);
    ctx.kv("IPv6        ", report.ipv6_address);
    ctx.kv("Client token", report.client_token);
    ctx.kv("Dashboard   ", &report.dashboard_url);
    Ok(())
}

fn dashboard_url(outcome: &InstallOutcome) -> String {
    format!(
        "http://{}@{}:{SERVICE_PORT}/dashboard",
        outcome.client_token, outcome.ipv4
    )
}
