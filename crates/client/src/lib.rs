//! Async HTTP client for the Paciolus backend.
//!
//! [`ApiClient`] is an explicit session object. It injects bearer and CSRF
//! tokens, caches GET responses per endpoint TTL, shares concurrent
//! identical GETs, retries transient failures with capped exponential
//! backoff and renews an expired access token once before giving up.
//!
//! Every call resolves to an [`ApiResponse`]; failures are values, not
//! panics or transport errors.

pub mod auth;
pub mod cache;
mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod retry;

pub use auth::{RefreshTokenRefresher, TokenRefresher};
pub use cache::{CacheStats, ResponseCache};
pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ClientError, extract_error_detail};
pub use request::{FormData, FormPart, RequestBody, RequestOptions};
pub use response::{ApiResponse, DownloadResult, parse_content_disposition};
pub use retry::RetryPolicy;

// Re-export the HTTP method type used in the public API.
pub use reqwest::Method;
