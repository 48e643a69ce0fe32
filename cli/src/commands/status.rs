//! Status command: query a running installer for one job.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use installer_common::{JobState, JobView};

use crate::domain::bootstrap::SERVICE_PORT;
use crate::output::{OutputContext, json};

const WATCH_INTERVAL: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Job id shown by the installer
    pub job_id: String,

    /// Installer base URL
    #[arg(long, env = "INSTALLER_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub server: String,

    /// Poll every second until the job finishes
    #[arg(long)]
    pub watch: bool,
}

/// Entry point for `chaincore-installer status`.
///
/// # Errors
///
/// Returns an error if the server is unreachable, the job is unknown, or
/// the job failed.
pub async fn run(ctx: &OutputContext, args: &StatusArgs, json: bool) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build http client")?;
    let url = status_url(&args.server, &args.job_id);

    let mut last = None;
    let view = loop {
        let view = fetch(&client, &url).await?;
        if !json && last != Some(view.state) {
            render_progress(ctx, &view);
            last = Some(view.state);
        }
        if !args.watch || view.state.is_terminal() {
            break view;
        }
        tokio::time::sleep(WATCH_INTERVAL).await;
    };

    if json {
        json::print(&view)?;
    } else {
        render_summary(ctx, &view);
    }
    if view.state == JobState::Failed {
        bail!(
            "install failed: {}",
            view.reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}

fn status_url(server: &str, job_id: &str) -> String {
    format!("{}/status/{job_id}", server.trim_end_matches('/'))
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<JobView> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        bail!("unknown job");
    }
    let response = response
        .error_for_status()
        .context("installer returned an error")?;
    response.json().await.context("malformed status response")
}

fn render_progress(ctx: &OutputContext, view: &JobView) {
    match view.state {
        JobState::Done => ctx.success(view.state.describe()),
        JobState::Failed => {}
        state => ctx.header(state.describe()),
    }
}

fn render_summary(ctx: &OutputContext, view: &JobView) {
    ctx.kv("Job         ", &view.id);
    ctx.kv("State       ", view.state.as_str());
    if let Some(ip) = &view.ip_address {
        ctx.kv("IPv4        ", ip);
    }
    if let Some(token) = &view.client_token {
        ctx.kv("Client token", token);
    }
    if view.state == JobState::Done
        && let Some(url) = view.dashboard_url(SERVICE_PORT)
    {
        ctx.kv("Dashboard   ", &url);
    }
}
