//! Shared helpers for client integration tests.
//!
//! Each test spins up an axum backend on an ephemeral port and talks to it
//! through a real `ApiClient`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use paciolus_client::{ApiClient, ApiClientBuilder, RetryPolicy};

/// Serves `app` on 127.0.0.1 and returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    format!("http://{addr}")
}

/// Base URL on which nothing is listening.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Retry policy with millisecond delays.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
    }
}

/// Client builder for `base_url` with fast retries.
pub fn builder(base_url: &str) -> ApiClientBuilder {
    ApiClient::builder(base_url)
        .timeout(Duration::from_secs(5))
        .retry(fast_retry())
}

/// Client for `base_url` with fast retries.
pub fn client(base_url: &str) -> ApiClient {
    builder(base_url).build().expect("Failed to build client")
}

/// Counts requests that reached a handler.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    /// Records one hit and returns the new total.
    pub fn hit(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Total hits so far.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
