//! Installer web front end.
//!
//! `GET /` opens a job and links to the provider's OAuth consent page.
//! `GET /progress` is the OAuth redirect target: it exchanges the code,
//! starts the job and serves a page that polls `GET /status/{id}`.

mod handlers;
pub mod pages;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::application::{Installer, JobRegistry};

/// How long running jobs get to record their outcome after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Upper bound on the retention sweep period.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Build the router. Handlers share one [`Installer`].
pub fn router(installer: Arc<Installer>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/progress", get(handlers::progress))
        .route("/status/{id}", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(installer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
}

/// Serve on `listener` until `shutdown` fires, then give running jobs
/// [`SHUTDOWN_GRACE`] to finish failing and revoke their credentials.
///
/// `shutdown` should be the token the installer was built with, so that
/// firing it also cancels every job.
///
/// # Errors
///
/// Returns an error if the listener address cannot be read or the server
/// fails.
pub async fn serve(
    listener: TcpListener,
    installer: Arc<Installer>,
    retention: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr().context("failed to read listen address")?;

    if let Some(retention) = retention {
        tokio::spawn(sweep_finished(
            Arc::clone(installer.registry()),
            retention,
            shutdown.clone(),
        ));
    }

    tracing::info!(%addr, "installer listening");
    let signal = shutdown.clone();
    axum::serve(listener, router(Arc::clone(&installer)))
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .context("HTTP server error")?;

    installer.shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("installer shut down");
    Ok(())
}

/// Evict finished and never-authorized jobs older than `retention` every
/// `min(retention, 60s)`
/// until `shutdown` fires.
pub async fn sweep_finished(
    registry: Arc<JobRegistry>,
    retention: Duration,
    shutdown: CancellationToken,
) {
    let period = retention.clamp(Duration::from_secs(1), MAX_SWEEP_PERIOD);
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = registry.evict_finished(retention);
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = registry.len(), "stale jobs evicted");
                }
            }
        }
    }
}
