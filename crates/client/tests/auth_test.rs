//! Integration tests for bearer/CSRF injection and token refresh.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use common::Hits;
use paciolus_client::{ApiResponse, RefreshTokenRefresher, RequestOptions, TokenRefresher};
use serde_json::{Value, json};

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

async fn echo(headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "authorization": header(&headers, "authorization"),
        "csrf": header(&headers, "x-csrf-token"),
    }))
}

async fn csrf(State(hits): State<Hits>) -> Json<Value> {
    let hit = hits.hit();
    Json(json!({ "csrf_token": format!("csrf-{hit}") }))
}

/// Only accepts the `fresh` access token.
async fn protected(State(hits): State<Hits>, headers: HeaderMap) -> impl IntoResponse {
    hits.hit();
    if header(&headers, "authorization").as_deref() == Some("Bearer fresh") {
        Json(json!({ "secret": 42 })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token expired" })),
        )
            .into_response()
    }
}

async fn login() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Invalid credentials" })),
    )
}

async fn refresh(Json(body): Json<Value>) -> impl IntoResponse {
    if body["refresh_token"] == "rt-1" {
        Json(json!({ "access_token": "fresh", "refresh_token": "rt-2" })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn app(protected_hits: &Hits, csrf_hits: &Hits) -> Router {
    let csrf_routes = Router::new()
        .route("/auth/csrf", get(csrf))
        .with_state(csrf_hits.clone());
    Router::new()
        .route("/echo", get(echo).post(echo))
        .route("/protected", get(protected).post(protected))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .with_state(protected_hits.clone())
        .merge(csrf_routes)
}

/// Refresher that counts calls and always hands out `token`.
fn counting_refresher(
    calls: &Arc<AtomicUsize>,
    token: &'static str,
) -> impl TokenRefresher + 'static {
    let calls = Arc::clone(calls);
    move || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(token.to_string())
        }
    }
}

#[tokio::test]
async fn test_bearer_token_injected() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let client = common::builder(&base)
        .access_token("session-token")
        .build()
        .expect("Failed to build client");

    let session: ApiResponse<Value> = client.get("/echo", RequestOptions::new()).await;
    let overridden: ApiResponse<Value> = client
        .get("/echo", RequestOptions::new().with_token("override"))
        .await;

    assert_eq!(session.data.unwrap()["authorization"], "Bearer session-token");
    assert_eq!(overridden.data.unwrap()["authorization"], "Bearer override");
}

#[tokio::test]
async fn test_csrf_header_only_on_mutations() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let client = common::client(&base);

    let token = client.fetch_csrf_token().await.expect("CSRF fetch failed");
    assert_eq!(token, "csrf-1");

    let read: ApiResponse<Value> = client
        .get("/echo", RequestOptions::new().skip_cache())
        .await;
    let write: ApiResponse<Value> = client
        .post("/echo", json!({}), RequestOptions::new())
        .await;

    assert_eq!(read.data.unwrap()["csrf"], Value::Null);
    assert_eq!(write.data.unwrap()["csrf"], "csrf-1");
}

#[tokio::test]
async fn test_401_refreshes_once_and_retries() {
    let protected_hits = Hits::default();
    let csrf_hits = Hits::default();
    let base = common::spawn(app(&protected_hits, &csrf_hits)).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let client = common::builder(&base)
        .access_token("stale")
        .token_refresher(counting_refresher(&calls, "fresh"))
        .build()
        .expect("Failed to build client");

    let response: ApiResponse<Value> = client.get("/protected", RequestOptions::new()).await;

    assert!(response.ok);
    assert_eq!(response.data, Some(json!({ "secret": 42 })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(protected_hits.count(), 2);
    assert_eq!(csrf_hits.count(), 1);
    assert_eq!(client.access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_refreshed_response_is_cached_under_new_token() {
    let protected_hits = Hits::default();
    let base = common::spawn(app(&protected_hits, &Hits::default())).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let client = common::builder(&base)
        .access_token("stale")
        .token_refresher(counting_refresher(&calls, "fresh"))
        .build()
        .expect("Failed to build client");

    let first: ApiResponse<Value> = client.get("/protected", RequestOptions::new()).await;
    let second: ApiResponse<Value> = client.get("/protected", RequestOptions::new()).await;

    assert!(first.ok && !first.cached);
    assert!(second.ok && second.cached);
    assert_eq!(second.data, Some(json!({ "secret": 42 })));
    assert_eq!(protected_hits.count(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_401_is_returned() {
    let protected_hits = Hits::default();
    let base = common::spawn(app(&protected_hits, &Hits::default())).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let client = common::builder(&base)
        .access_token("stale")
        .token_refresher(counting_refresher(&calls, "still-stale"))
        .build()
        .expect("Failed to build client");

    let response: ApiResponse<Value> = client.get("/protected", RequestOptions::new()).await;

    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Token expired"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(protected_hits.count(), 2);
}

#[tokio::test]
async fn test_401_without_refresher() {
    let protected_hits = Hits::default();
    let base = common::spawn(app(&protected_hits, &Hits::default())).await;
    let client = common::client(&base);

    let response: ApiResponse<Value> = client
        .post("/protected", json!({}), RequestOptions::new().idempotent())
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(protected_hits.count(), 1);
}

#[tokio::test]
async fn test_auth_endpoints_skip_refresh() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let client = common::builder(&base)
        .token_refresher(counting_refresher(&calls, "fresh"))
        .build()
        .expect("Failed to build client");

    let response: ApiResponse<Value> = client
        .post(
            "/auth/login",
            json!({ "email": "a@b.c" }),
            RequestOptions::new(),
        )
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(response.error.as_deref(), Some("Invalid credentials"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let client = common::builder(&base)
        .access_token("stale")
        .token_refresher(counting_refresher(&calls, "fresh"))
        .build()
        .expect("Failed to build client");

    let requests = (0..4).map(|i| {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .get::<Value>(&format!("/protected?n={i}"), RequestOptions::new())
                .await
        })
    });
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        assert!(response.expect("Task panicked").ok);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_token_refresher_rotates() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let refresher = RefreshTokenRefresher::new(&base, "rt-1");

    assert_eq!(refresher.refresh().await.as_deref(), Some("fresh"));
    assert_eq!(refresher.refresh_token(), "rt-2");

    // The rotated token is no longer accepted by this backend.
    assert_eq!(refresher.refresh().await, None);
}

#[tokio::test]
async fn test_refresh_token_refresher_end_to_end() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let client = common::builder(&base)
        .access_token("stale")
        .build()
        .expect("Failed to build client");
    client.set_token_refresher(RefreshTokenRefresher::new(&base, "rt-1"));

    let response: ApiResponse<Value> = client.get("/protected", RequestOptions::new()).await;

    assert!(response.ok);
    assert_eq!(client.access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_clear_session_drops_tokens() {
    let base = common::spawn(app(&Hits::default(), &Hits::default())).await;
    let client = common::builder(&base)
        .access_token("session-token")
        .build()
        .expect("Failed to build client");

    client.clear_session();
    let response: ApiResponse<Value> = client.get("/echo", RequestOptions::new()).await;

    assert_eq!(response.data.unwrap()["authorization"], Value::Null);
}
