//! Session state and access-token refresh.

use std::future::Future;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Obtains a new access token after the current one was rejected.
///
/// Returning `None` means the session cannot be renewed; the original
/// 401 is then handed back to the caller.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns a fresh access token.
    async fn refresh(&self) -> Option<String>;
}

#[async_trait]
impl<F, Fut> TokenRefresher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    async fn refresh(&self) -> Option<String> {
        self().await
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refreshes through the backend's `POST /auth/refresh` endpoint.
///
/// Rotated refresh tokens returned by the backend replace the stored one.
#[derive(Debug)]
pub struct RefreshTokenRefresher {
    http: reqwest::Client,
    url: String,
    refresh_token: RwLock<String>,
}

impl RefreshTokenRefresher {
    /// Creates a refresher for the backend at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, refresh_token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, refresh_token)
    }

    /// Creates a refresher sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
            refresh_token: RwLock::new(refresh_token.into()),
        }
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> String {
        self.refresh_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenRefresher for RefreshTokenRefresher {
    async fn refresh(&self) -> Option<String> {
        let body = json!({ "refresh_token": self.refresh_token() });
        let response = match self.http.post(&self.url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Token refresh rejected");
            return None;
        }

        let tokens: RefreshResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token refresh returned an unexpected body");
                return None;
            }
        };

        if let Some(rotated) = tokens.refresh_token {
            *self
                .refresh_token
                .write()
                .unwrap_or_else(PoisonError::into_inner) = rotated;
            debug!("Refresh token rotated");
        }
        Some(tokens.access_token)
    }
}

/// Tokens held by one client session.
#[derive(Debug, Default)]
pub(crate) struct Session {
    access_token: RwLock<Option<String>>,
    csrf_token: RwLock<Option<String>>,
}

impl Session {
    pub(crate) fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub(crate) fn csrf_token(&self) -> Option<String> {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_csrf_token(&self, token: Option<String>) {
        *self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub(crate) fn clear(&self) {
        self.set_access_token(None);
        self.set_csrf_token(None);
    }
}
