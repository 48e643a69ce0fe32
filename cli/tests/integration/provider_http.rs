//! HTTP adapters against a local mock of the DigitalOcean API.

#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chaincore_installer::application::{Authorizer, CloudProvider, InstanceSpec};
use chaincore_installer::domain::{BearerCredential, DeployError};
use chaincore_installer::infra::digitalocean::DigitalOceanClient;
use chaincore_installer::infra::oauth::{DigitalOceanAuthorizer, OAuthApp};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    auth: String,
    query: HashMap<String, String>,
    body: String,
}

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<Seen>>>);

impl Log {
    fn push(&self, path: &str, headers: &HeaderMap, query: HashMap<String, String>, body: String) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.0.lock().expect("lock").push(Seen {
            path: path.to_string(),
            auth,
            query,
            body,
        });
    }

    fn all(&self) -> Vec<Seen> {
        self.0.lock().expect("lock").clone()
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move { axum::serve(listener, router).await });
    format!("http://{addr}")
}

fn provider_api(log: Log) -> Router {
    Router::new()
        .route(
            "/v2/volumes",
            post(
                |State(log): State<Log>, headers: HeaderMap, body: String| async move {
                    log.push("/v2/volumes", &headers, HashMap::new(), body.clone());
                    let req: Value = serde_json::from_str(&body).unwrap_or_default();
                    if req["name"] == "taken-storage" {
                        return (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            Json(json!({"id": "unprocessable_entity", "message": "name taken"})),
                        );
                    }
                    (StatusCode::CREATED, Json(json!({"volume": {"id": "vol-123"}})))
                },
            ),
        )
        .route(
            "/v2/account/keys",
            get(
                |State(log): State<Log>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    log.push("/v2/account/keys", &headers, q, String::new());
                    Json(json!({"ssh_keys": [
                        {"id": 7, "fingerprint": "aa:bb", "name": "laptop"},
                        {"id": 8, "fingerprint": "cc:dd", "name": "ci"}
                    ]}))
                },
            ),
        )
        .route(
            "/v2/droplets",
            post(
                |State(log): State<Log>, headers: HeaderMap, body: String| async move {
                    log.push("/v2/droplets", &headers, HashMap::new(), body);
                    (StatusCode::ACCEPTED, Json(json!({"droplet": {"id": 99, "networks": {}}})))
                },
            ),
        )
        .route(
            "/v2/droplets/{id}",
            get(|Path(id): Path<u64>| async move {
                Json(json!({"droplet": {"id": id, "networks": {
                    "v4": [
                        {"ip_address": "10.10.0.2", "type": "private"},
                        {"ip_address": "203.0.113.9", "type": "public"}
                    ],
                    "v6": [{"ip_address": "2001:db8::9", "type": "public"}]
                }}}))
            }),
        )
        .with_state(log)
}

fn oauth_api(log: Log, access_token: &'static str, revoke_status: StatusCode) -> Router {
    Router::new()
        .route(
            "/v1/oauth/token",
            post(
                move |State(log): State<Log>, headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    log.push("/v1/oauth/token", &headers, q, String::new());
                    Json(json!({
                        "access_token": access_token,
                        "token_type": "bearer",
                        "scope": "read write"
                    }))
                },
            ),
        )
        .route(
            "/v1/oauth/revoke",
            post(
                move |State(log): State<Log>, headers: HeaderMap, body: String| async move {
                    log.push("/v1/oauth/revoke", &headers, HashMap::new(), body);
                    revoke_status.into_response()
                },
            ),
        )
        .with_state(log)
}

fn app() -> OAuthApp {
    OAuthApp {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://install.example.com/progress".to_string(),
    }
}

#[tokio::test]
async fn provider_calls_use_bearer_auth_and_documented_paths() {
    let log = Log::default();
    let base = spawn(provider_api(log.clone())).await;
    let client = DigitalOceanClient::new(&format!("{base}/v2"), "do-token").expect("client");

    let volume = client
        .create_volume("sfo2", "chain-core-storage", 100)
        .await
        .expect("volume");
    assert_eq!(volume, "vol-123");

    let keys = client.list_ssh_keys().await.expect("keys");
    assert_eq!(keys.iter().map(|k| k.id).collect::<Vec<_>>(), vec![7, 8]);

    let spec = InstanceSpec {
        name: "chain-core".to_string(),
        region: "sfo2".to_string(),
        size: "1gb".to_string(),
        image: "ubuntu-22-04-x64".to_string(),
        user_data: "#cloud-config\n".to_string(),
        volume_ids: vec![volume],
        ssh_key_ids: vec![7, 8],
        ipv6: true,
    };
    assert_eq!(client.create_instance(&spec).await.expect("droplet"), 99);

    let seen = log.all();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|s| s.auth == "Bearer do-token"));

    let volume_body: Value = serde_json::from_str(&seen[0].body).expect("json");
    assert_eq!(volume_body["size_gigabytes"], 100);
    assert_eq!(volume_body["region"], "sfo2");
    assert_eq!(seen[1].query.get("per_page").map(String::as_str), Some("200"));

    let droplet_body: Value = serde_json::from_str(&seen[2].body).expect("json");
    assert_eq!(droplet_body["volumes"], json!(["vol-123"]));
    assert_eq!(droplet_body["ssh_keys"], json!([7, 8]));
    assert_eq!(droplet_body["ipv6"], true);
    assert_eq!(droplet_body["user_data"], "#cloud-config\n");
}

#[tokio::test]
async fn get_instance_reports_public_addresses_only() {
    let base = spawn(provider_api(Log::default())).await;
    let client = DigitalOceanClient::new(&format!("{base}/v2"), "t").expect("client");
    let addrs = client.get_instance(99).await.expect("droplet");
    assert_eq!(addrs.ipv4, "203.0.113.9");
    assert_eq!(addrs.ipv6, "2001:db8::9");
}

#[tokio::test]
async fn api_error_carries_status_and_message() {
    let base = spawn(provider_api(Log::default())).await;
    let client = DigitalOceanClient::new(&format!("{base}/v2"), "t").expect("client");
    let err = client
        .create_volume("sfo2", "taken-storage", 100)
        .await
        .expect_err("rejected");
    assert!(matches!(err, DeployError::ProviderApi(_)));
    assert_eq!(
        err.to_string(),
        "provider API error: create volume: 422 Unprocessable Entity: name taken"
    );
}

#[tokio::test]
async fn code_exchange_sends_grant_and_returns_scoped_credential() {
    let log = Log::default();
    let base = spawn(oauth_api(log.clone(), "granted", StatusCode::OK)).await;
    let authorizer =
        DigitalOceanAuthorizer::new(format!("{base}/v1/oauth"), app()).expect("authorizer");

    let credential = authorizer.exchange("the-code").await.expect("exchange");
    assert_eq!(credential.access_token(), "granted");
    assert!(credential.require_scope().is_ok());

    let seen = log.all();
    let q = &seen[0].query;
    assert_eq!(q.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(q.get("code").map(String::as_str), Some("the-code"));
    assert_eq!(q.get("client_secret").map(String::as_str), Some("client-secret"));
    assert_eq!(
        q.get("redirect_uri").map(String::as_str),
        Some("https://install.example.com/progress")
    );
}

#[tokio::test]
async fn empty_access_token_is_an_authorization_error() {
    let base = spawn(oauth_api(Log::default(), "", StatusCode::OK)).await;
    let authorizer =
        DigitalOceanAuthorizer::new(format!("{base}/v1/oauth"), app()).expect("authorizer");
    let err = authorizer.exchange("c").await.expect_err("no token");
    assert_eq!(err.to_string(), "authorization failed: missing access token");
}

#[tokio::test]
async fn revoke_posts_token_with_bearer_auth() {
    let log = Log::default();
    let base = spawn(oauth_api(log.clone(), "x", StatusCode::OK)).await;
    let authorizer =
        DigitalOceanAuthorizer::new(format!("{base}/v1/oauth"), app()).expect("authorizer");

    authorizer
        .revoke(BearerCredential::new("abc", "read write"))
        .await
        .expect("revoke");

    let seen = log.all();
    assert_eq!(seen[0].path, "/v1/oauth/revoke");
    assert_eq!(seen[0].auth, "Bearer abc");
    assert_eq!(seen[0].body, "token=abc");
}

#[tokio::test]
async fn revoke_rejects_non_ok_status() {
    let base = spawn(oauth_api(Log::default(), "x", StatusCode::UNAUTHORIZED)).await;
    let authorizer =
        DigitalOceanAuthorizer::new(format!("{base}/v1/oauth"), app()).expect("authorizer");
    let err = authorizer
        .revoke(BearerCredential::new("abc", "read write"))
        .await
        .expect_err("401");
    assert_eq!(
        err.to_string(),
        "authorization failed: revoke endpoint returned 401 status code"
    );
}
