//! The installer router, driven with `tower::ServiceExt::oneshot`.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chaincore_installer::application::{Installer, JobRegistry};
use chaincore_installer::server::{router, sweep_finished};
use http_body_util::BodyExt;
use installer_common::{JobState, JobView};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::fakes::{
    CloudState, FakeProber, FakeShell, RecordingAuthorizer, TOKEN_OUTPUT, deps, fast_settings,
};

struct App {
    installer: Arc<Installer>,
    authorizer: Arc<RecordingAuthorizer>,
    cloud: Arc<CloudState>,
}

impl App {
    fn new(scope: &str) -> Self {
        let cloud = CloudState::addressed_after(0);
        let authorizer = Arc::new(RecordingAuthorizer::granting(scope));
        let installer = Arc::new(Installer::new(
            Arc::new(JobRegistry::new()),
            deps(
                &cloud,
                Arc::new(FakeShell::printing(TOKEN_OUTPUT)),
                Arc::new(FakeProber::open()),
            ),
            authorizer.clone(),
            fast_settings(),
            CancellationToken::new(),
        ));
        Self {
            installer,
            authorizer,
            cloud,
        }
    }

    fn router(&self) -> Router {
        router(Arc::clone(&self.installer))
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = response.into_body().collect().await.expect("body").to_bytes();
        (status, String::from_utf8(body.to_vec()).expect("utf8"))
    }

    /// Open a job through `GET /` and return its id.
    async fn open_job(&self) -> String {
        let (status, page) = self.get("/").await;
        assert_eq!(status, StatusCode::OK);
        let start = page.find("state=").expect("state in link") + "state=".len();
        page[start..start + 32].to_string()
    }

    async fn wait_for(&self, id: &str, state: JobState) -> JobView {
        for _ in 0..15_000 {
            let (status, body) = self.get(&format!("/status/{id}")).await;
            assert_eq!(status, StatusCode::OK);
            let view: JobView = serde_json::from_str(&body).expect("job view");
            if view.state == state {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("job {id} never reached {state}");
    }
}

#[tokio::test]
async fn health_is_ok() {
    let (status, _) = App::new("read write").get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn index_opens_pending_job_and_links_to_consent() {
    let app = App::new("read write");
    let id = app.open_job().await;

    let (status, body) = app.get(&format!("/status/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let view: JobView = serde_json::from_str(&body).expect("job view");
    assert_eq!(view.state, JobState::PendingAuth);
    assert!(view.client_token.is_none());
}

#[tokio::test]
async fn progress_requires_code_and_state() {
    let app = App::new("read write");
    for uri in ["/progress", "/progress?code=abc", "/progress?state=abc", "/progress?code=&state="] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, "invalid oauth2 grant");
    }
}

#[tokio::test]
async fn progress_rejects_unknown_state() {
    let app = App::new("read write");
    let (status, body) = app
        .get("/progress?code=abc&state=0123456789abcdef0123456789abcdef")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "invalid oauth2 state");
}

#[tokio::test]
async fn failed_code_exchange_is_bad_request() {
    let app = App::new("read write");
    let id = app.open_job().await;
    let (status, _) = app.get(&format!("/progress?code=bad&state={id}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.installer.status(&id).map(|v| v.state),
        Some(JobState::PendingAuth)
    );
}

#[tokio::test]
async fn insufficient_scope_is_rejected_and_job_stays_pending() {
    let app = App::new("read");
    let id = app.open_job().await;

    let (status, body) = app.get(&format!("/progress?code=abc&state={id}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "need read write OAuth scope");
    assert_eq!(
        app.installer.status(&id).map(|v| v.state),
        Some(JobState::PendingAuth)
    );
    assert!(app.cloud.calls().is_empty());

    app.installer.shutdown(Duration::from_secs(5)).await;
    assert_eq!(app.authorizer.revoked(), vec!["token-abc".to_string()]);
}

#[tokio::test]
async fn progress_starts_job_which_completes() {
    let app = App::new("read write");
    let id = app.open_job().await;

    let (status, page) = app.get(&format!("/progress?code=abc&state={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains(&id));

    let view = app.wait_for(&id, JobState::Done).await;
    assert!(view.client_token.as_deref().is_some_and(|t| t.starts_with("do:")));
    assert_eq!(view.ip_address.as_deref(), Some(crate::fakes::IPV4));

    let (status, _) = app.get(&format!("/progress?code=again&state={id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_status_is_not_found() {
    let app = App::new("read write");
    let (status, _) = app.get("/status/0123456789abcdef0123456789abcdef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/status/not-a-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn sweeper_evicts_finished_and_abandoned_jobs() {
    use chaincore_installer::application::JobId;

    let registry = Arc::new(JobRegistry::new());
    let abandoned = registry.create(JobId::generate()).expect("create");
    let running = registry.create(JobId::generate()).expect("create");
    running.claim().expect("claim");
    let failed = registry.create(JobId::generate()).expect("create");
    failed.claim().expect("claim");
    failed.fail("cancelled").expect("fail");

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_finished(
        Arc::clone(&registry),
        Duration::from_millis(1),
        shutdown.clone(),
    ));
    // Paused time does not move the wall clock that job timestamps use.
    std::thread::sleep(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(registry.get(running.id().as_str()).is_some());
    assert!(registry.get(abandoned.id().as_str()).is_none());
    assert!(registry.get(failed.id().as_str()).is_none());
    assert_eq!(registry.len(), 1);
    shutdown.cancel();
    sweeper.await.expect("sweeper");
}
