//! Route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use crate::application::Installer;
use crate::domain::{DeployError, JobError};
use crate::server::pages;

#[derive(Debug, Deserialize)]
pub(super) struct ProgressQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

pub(super) async fn index(State(installer): State<Arc<Installer>>) -> Response {
    let job = match installer.open() {
        Ok(job) => job,
        Err(e) => return internal_error(&e),
    };
    match installer.authorizer().authorize_url(job.id().as_str()) {
        Ok(link) => Html(pages::index(&link)).into_response(),
        Err(e) => internal_error(&e),
    }
}

pub(super) async fn progress(
    State(installer): State<Arc<Installer>>,
    Query(query): Query<ProgressQuery>,
) -> Response {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (Some(code), Some(id)) = (non_empty(query.code), non_empty(query.state)) else {
        return (StatusCode::BAD_REQUEST, "invalid oauth2 grant").into_response();
    };
    if installer.status(&id).is_none() {
        return (StatusCode::BAD_REQUEST, "invalid oauth2 state").into_response();
    }

    let credential = match installer.authorizer().exchange(&code).await {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "authorization code exchange failed");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match installer.start(&id, credential) {
        Ok(_task) => Html(pages::progress(&id)).into_response(),
        Err(e) => job_error(&e),
    }
}

pub(super) async fn status(
    State(installer): State<Arc<Installer>>,
    Path(id): Path<String>,
) -> Response {
    match installer.status(&id) {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown install").into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::OK
}

fn job_error(err: &JobError) -> Response {
    match err {
        JobError::NotFound(_) => (StatusCode::BAD_REQUEST, "invalid oauth2 state").into_response(),
        JobError::AlreadyStarted(_) => (StatusCode::CONFLICT, err.to_string()).into_response(),
        JobError::Rejected(DeployError::Authorization(reason)) => {
            (StatusCode::BAD_REQUEST, reason.clone()).into_response()
        }
        _ => internal_error(err),
    }
}

fn internal_error(err: &dyn std::fmt::Display) -> Response {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}
