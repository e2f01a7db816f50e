mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chirp::models::Credentials;
use chirp::{ApiError, RequestConfig, SocialApi, TokenStore};
use serde_json::json;

use support::{api_client, spawn_server};

/// Fake auth backend: accepts exactly one token at a time and can rotate it on refresh.
struct AuthServer {
    accepted: Mutex<String>,
    /// Token handed out by `auth/refresh`; `None` rejects the refresh.
    issue: Option<&'static str>,
    /// Whether an issued token becomes the accepted one.
    honor_issued: bool,
    refreshes: AtomicUsize,
    refresh_cookie: Mutex<Option<String>>,
    seen: Mutex<HashMap<String, usize>>,
    login_had_bearer: Mutex<Option<bool>>,
    tweet_hits: AtomicUsize,
}

impl AuthServer {
    fn new(accepted: &str, issue: Option<&'static str>, honor_issued: bool) -> Arc<Self> {
        Arc::new(Self {
            accepted: Mutex::new(accepted.to_string()),
            issue,
            honor_issued,
            refreshes: AtomicUsize::new(0),
            refresh_cookie: Mutex::new(None),
            seen: Mutex::new(HashMap::new()),
            login_had_bearer: Mutex::new(None),
            tweet_hits: AtomicUsize::new(0),
        })
    }

    fn seen(&self, token: &str) -> usize {
        self.seen.lock().unwrap().get(token).copied().unwrap_or(0)
    }

    fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/api/v1/auth/me", get(me))
            .route("/api/v1/auth/refresh", post(refresh))
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/tweets/{id}", get(tweet))
            .with_state(Arc::clone(self))
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "jwt expired"}))).into_response()
}

async fn me(State(server): State<Arc<AuthServer>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer(&headers) else {
        return unauthorized();
    };
    *server.seen.lock().unwrap().entry(token.clone()).or_default() += 1;
    if token == *server.accepted.lock().unwrap() {
        Json(json!({"id": "u-alice", "username": "alice", "name": "Alice"})).into_response()
    } else {
        unauthorized()
    }
}

async fn refresh(State(server): State<Arc<AuthServer>>, headers: HeaderMap) -> Response {
    server.refreshes.fetch_add(1, Ordering::SeqCst);
    *server.refresh_cookie.lock().unwrap() = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    // Long enough for every concurrent 401 to arrive while this is in flight.
    tokio::time::sleep(Duration::from_millis(50)).await;
    match server.issue {
        Some(token) => {
            if server.honor_issued {
                *server.accepted.lock().unwrap() = token.to_string();
            }
            Json(json!({"accessToken": token})).into_response()
        }
        None => unauthorized(),
    }
}

async fn login(State(server): State<Arc<AuthServer>>, headers: HeaderMap) -> Response {
    *server.login_had_bearer.lock().unwrap() = Some(headers.contains_key(AUTHORIZATION));
    Json(json!({"accessToken": "issued-at-login"})).into_response()
}

async fn tweet(State(server): State<Arc<AuthServer>>, Path(id): Path<String>) -> Response {
    server.tweet_hits.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "db down"}))).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "no such tweet"}))).into_response(),
    }
}

#[tokio::test]
async fn missing_token_redirects_without_a_request() {
    let server = AuthServer::new("good", None, false);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, _tokens) = api_client(endpoint, None);

    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ApiError::Redirect { ref redirect_to } if redirect_to == "/tweets/t1"));
    assert!(server.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = AuthServer::new("good", Some("fresh"), true);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, tokens) = api_client(endpoint, Some("stale"));
    client.restore_cookies("refresh=r1").unwrap();

    let callers = 8;
    let results = futures::future::join_all((0..callers).map(|_| client.me())).await;

    for result in &results {
        assert_eq!(result.as_ref().unwrap().username, "alice");
    }
    assert_eq!(server.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(client.refresh_attempts(), 1);
    assert!(!client.is_refreshing());
    // Every caller sent the stale token once and retried exactly once.
    assert_eq!(server.seen("stale"), callers);
    assert_eq!(server.seen("fresh"), callers);
    assert_eq!(tokens.access_token().as_deref(), Some("fresh"));
    assert!(server.refresh_cookie.lock().unwrap().as_deref().unwrap().contains("refresh=r1"));
}

#[tokio::test]
async fn second_401_is_terminal_and_clears_token() {
    let server = AuthServer::new("never", Some("fresh"), false);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, tokens) = api_client(endpoint, Some("stale"));

    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication { .. }));
    assert_eq!(server.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(server.seen("stale"), 1);
    assert_eq!(server.seen("fresh"), 1);
    assert_eq!(tokens.access_token(), None);

    // With the token gone the next call redirects instead of refreshing again.
    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ApiError::Redirect { .. }));
    assert_eq!(server.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_refresh_clears_token() {
    let server = AuthServer::new("good", None, false);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, tokens) = api_client(endpoint, Some("stale"));

    let err = client.me().await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication { .. }));
    assert_eq!(server.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(server.seen("stale"), 1);
    assert_eq!(tokens.access_token(), None);
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let server = AuthServer::new("good", Some("fresh"), true);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, _tokens) = api_client(endpoint, Some("good"));

    let err = client.tweet("gone").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
    assert!(err.is_operational());

    let err = client.tweet("boom").await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 500, .. }));

    assert_eq!(server.tweet_hits.load(Ordering::SeqCst), 2);
    assert_eq!(server.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn anonymous_calls_carry_no_bearer() {
    let server = AuthServer::new("issued-at-login", None, false);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, tokens) = api_client(endpoint, Some("left-over"));

    client
        .login(&Credentials {
            email: "alice@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert_eq!(*server.login_had_bearer.lock().unwrap(), Some(false));
    assert_eq!(tokens.access_token().as_deref(), Some("issued-at-login"));

    let viewer = client.me().await.unwrap();
    assert_eq!(viewer.username, "alice");
}

#[tokio::test]
async fn raw_calls_surface_typed_errors() {
    let server = AuthServer::new("good", None, false);
    let (endpoint, _shutdown, _handle) = spawn_server(server.router()).await;
    let (client, _tokens) = api_client(endpoint, Some("good"));

    let err = client
        .call_api("tweets/gone", RequestConfig::get().anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
    assert_eq!(server.tweet_hits.load(Ordering::SeqCst), 1);
}
