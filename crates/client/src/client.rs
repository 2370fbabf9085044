//! The API client: one explicit session against the Paciolus backend.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use paciolus_shared::{AppConfig, AppError, CacheConfig};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{Session, TokenRefresher};
use crate::cache::{CacheStats, ResponseCache};
use crate::error::{ClientError, extract_error_detail};
use crate::request::{RequestBody, RequestOptions, is_mutating};
use crate::response::{ApiResponse, DownloadResult, parse_content_disposition};
use crate::retry::{RetryPolicy, parse_retry_after};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint that issues CSRF tokens.
const CSRF_ENDPOINT: &str = "/auth/csrf";

/// Header carrying the CSRF token on mutating requests.
const CSRF_HEADER: &str = "X-CSRF-Token";

/// Header carrying the idempotency key.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

type InFlight = Shared<BoxFuture<'static, ApiResponse<Value>>>;

/// Async client for the Paciolus backend.
///
/// Cloning is cheap; clones share the session, cache and in-flight requests.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
    session: Session,
    refresher: RwLock<Option<Arc<dyn TokenRefresher>>>,
    refresh_lock: Mutex<()>,
    cache: ResponseCache,
    in_flight: DashMap<String, InFlight>,
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    cache: CacheConfig,
    access_token: Option<String>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl ApiClientBuilder {
    /// Sets the default request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the response cache configuration.
    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Starts the session with an access token.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Registers the token refresher used on 401 responses.
    #[must_use]
    pub fn token_refresher(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let http = reqwest::Client::builder()
            .gzip(true)
            .build()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        let session = Session::default();
        session.set_access_token(self.access_token);

        Ok(ApiClient {
            inner: Arc::new(Inner {
                base_url: self.base_url.trim_end_matches('/').to_string(),
                http,
                timeout: self.timeout,
                retry: self.retry,
                session,
                refresher: RwLock::new(self.refresher),
                refresh_lock: Mutex::new(()),
                cache: ResponseCache::new(self.cache),
                in_flight: DashMap::new(),
            }),
        })
    }
}

/// A response that arrived, whatever its status.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    /// Bearer token the request was sent with.
    token: Option<String>,
}

impl RawResponse {
    fn header(&self, name: impl reqwest::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn to_error(&self) -> AppError {
        let detail = serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|body| extract_error_detail(&body));
        AppError::from_status(self.status.as_u16(), detail)
    }

    /// Server-requested delay, honoured on 429 and 503 only.
    fn retry_after(&self) -> Option<Duration> {
        if !matches!(
            self.status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return None;
        }
        self.header(RETRY_AFTER)
            .and_then(|value| parse_retry_after(value, Utc::now()))
    }

    fn into_json(self) -> ApiResponse<Value> {
        let status = self.status.as_u16();
        if self.status == StatusCode::NO_CONTENT || self.body.iter().all(u8::is_ascii_whitespace)
        {
            return ApiResponse::success(None, status, false);
        }
        match serde_json::from_slice(&self.body) {
            Ok(data) => ApiResponse::success(Some(data), status, false),
            Err(e) => ApiResponse {
                data: None,
                error: Some(ClientError::Decode(e.to_string()).to_string()),
                status,
                ok: false,
                cached: false,
            },
        }
    }
}

fn network_error(err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Network("Request timed out. Please try again.".to_string())
    } else {
        AppError::Network(AppError::default_message(0).to_string())
    }
}

fn is_auth_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("/auth/")
}

impl ApiClient {
    /// Starts building a client for the backend at `base_url`.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
            access_token: None,
            refresher: None,
        }
    }

    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        Self::builder(config.api.base_url.clone())
            .timeout(config.api.timeout())
            .retry(RetryPolicy::from(&config.retry))
            .cache(config.cache.clone())
            .build()
    }

    /// Backend base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner.session.access_token()
    }

    /// Replaces the session's access token.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.inner.session.set_access_token(Some(token.into()));
    }

    /// Forgets the access and CSRF tokens and drops every cached response.
    pub fn clear_session(&self) {
        self.inner.session.clear();
        self.inner.cache.clear();
        info!("Session cleared");
    }

    /// Registers the token refresher used on 401 responses.
    pub fn set_token_refresher(&self, refresher: impl TokenRefresher + 'static) {
        *self
            .inner
            .refresher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(refresher));
    }

    /// Fetches a CSRF token from the backend and stores it for mutating calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body has no `csrf_token`.
    pub async fn fetch_csrf_token(&self) -> Result<String, ClientError> {
        let token = self.access_token();
        let raw = self
            .send_once(
                &Method::GET,
                CSRF_ENDPOINT,
                None,
                &RequestOptions::default(),
                token.as_deref(),
            )
            .await?;
        if !raw.status.is_success() {
            return Err(raw.to_error().into());
        }

        let body: Value =
            serde_json::from_slice(&raw.body).map_err(|e| ClientError::Decode(e.to_string()))?;
        let csrf = body
            .get("csrf_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Decode("missing csrf_token".to_string()))?
            .to_string();

        self.inner.session.set_csrf_token(Some(csrf.clone()));
        debug!("CSRF token refreshed");
        Ok(csrf)
    }

    /// Cached, deduplicated GET.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.get_value(endpoint, &options).await.decode()
    }

    /// POST with a body.
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.request(Method::POST, endpoint, Some(body.into()), options)
            .await
    }

    /// PUT with a body.
    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.request(Method::PUT, endpoint, Some(body.into()), options)
            .await
    }

    /// PATCH with a body.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.request(Method::PATCH, endpoint, Some(body.into()), options)
            .await
    }

    /// DELETE.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        self.request(Method::DELETE, endpoint, None, options).await
    }

    /// Sends any request through the shared pipeline.
    ///
    /// Bodiless GETs go through the cache. Successful mutations invalidate
    /// cached responses under the endpoint's base path and its parent.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        if method == Method::GET && body.is_none() {
            return self.get_value(endpoint, &options).await.decode();
        }

        let response = self
            .fetch_json(&method, endpoint, body.as_ref(), &options)
            .await;
        if response.ok && is_mutating(&method) {
            self.inner.cache.invalidate_for_mutation(endpoint);
            debug!(%method, endpoint, "Cache invalidated after mutation");
        }
        response.decode()
    }

    /// Downloads a file.
    ///
    /// The file name comes from `Content-Disposition`, falling back to
    /// `default_filename`.
    pub async fn download(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<RequestBody>,
        default_filename: &str,
        options: RequestOptions,
    ) -> ApiResponse<DownloadResult> {
        match self
            .dispatch(&method, endpoint, body.as_ref(), &options)
            .await
        {
            Ok(raw) => {
                let filename = raw
                    .header(CONTENT_DISPOSITION)
                    .and_then(parse_content_disposition)
                    .unwrap_or_else(|| default_filename.to_string());
                let content_type = raw.header(CONTENT_TYPE).map(ToString::to_string);
                debug!(endpoint, %filename, size = raw.body.len(), "Download complete");
                ApiResponse::success(
                    Some(DownloadResult {
                        bytes: raw.body,
                        filename,
                        content_type,
                    }),
                    raw.status.as_u16(),
                    false,
                )
            }
            Err(e) => ApiResponse::from_error(&e),
        }
    }

    /// Warms the cache for `endpoint`. Returns whether the fetch succeeded.
    pub async fn prefetch(&self, endpoint: &str) -> bool {
        self.get_value(endpoint, &RequestOptions::default())
            .await
            .ok
    }

    /// Drops cached responses for `prefix` and everything below it.
    pub fn invalidate_cache(&self, prefix: &str) {
        self.inner.cache.invalidate_prefix(prefix);
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Returns cache occupancy after running pending maintenance.
    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.run_pending_tasks().await;
        self.inner.cache.stats()
    }

    async fn get_value(&self, endpoint: &str, options: &RequestOptions) -> ApiResponse<Value> {
        if options.skip_cache {
            return self.fetch_json(&Method::GET, endpoint, None, options).await;
        }

        let token = options.token.clone().or_else(|| self.access_token());
        let key = ResponseCache::key(&Method::GET, endpoint, token.as_deref(), &options.headers);

        if let Some(data) = self.inner.cache.get(&key).await {
            debug!(endpoint, "Cache hit");
            return ApiResponse::success(Some(Value::clone(&data)), 200, true);
        }

        let request = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(endpoint, "Joining in-flight request");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let client = self.clone();
                let endpoint = endpoint.to_string();
                let options = options.clone();
                let request = async move {
                    let (response, sent_with) =
                        match client.dispatch(&Method::GET, &endpoint, None, &options).await {
                            Ok(raw) => {
                                let sent_with = raw.token.clone();
                                (raw.into_json(), sent_with)
                            }
                            Err(e) => (ApiResponse::from_error(&e), None),
                        };
                    // A refresh mid-request means the body belongs to the new token.
                    if response.ok
                        && let Some(data) = &response.data
                    {
                        let cache_key = ResponseCache::key(
                            &Method::GET,
                            &endpoint,
                            sent_with.as_deref(),
                            &options.headers,
                        );
                        client
                            .inner
                            .cache
                            .insert(cache_key, &endpoint, Arc::new(data.clone()))
                            .await;
                    }
                    client.inner.in_flight.remove(&key);
                    response
                }
                .boxed()
                .shared();
                entry.insert(request.clone());
                request
            }
        };
        request.await
    }

    async fn fetch_json(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<&RequestBody>,
        options: &RequestOptions,
    ) -> ApiResponse<Value> {
        match self.dispatch(method, endpoint, body, options).await {
            Ok(raw) => raw.into_json(),
            Err(e) => ApiResponse::from_error(&e),
        }
    }

    /// Runs the retry loop and one-shot token refresh around `send_once`.
    ///
    /// Returns the successful response or the final error.
    async fn dispatch(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<&RequestBody>,
        options: &RequestOptions,
    ) -> Result<RawResponse, ClientError> {
        let max_retries = options.max_retries.unwrap_or(self.inner.retry.max_retries);
        let replayable = RetryPolicy::allows(method, options.idempotency_key.is_some());
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            let token = options.token.clone().or_else(|| self.access_token());
            let (error, retry_after) =
                match self.send_once(method, endpoint, body, options, token.as_deref()).await {
                    Ok(raw) if raw.status.is_success() => return Ok(raw),
                    Ok(raw)
                        if raw.status == StatusCode::UNAUTHORIZED
                            && !refreshed
                            && options.token.is_none()
                            && !is_auth_endpoint(endpoint) =>
                    {
                        refreshed = true;
                        if self.refresh_session(token.as_deref()).await {
                            debug!(%method, endpoint, "Retrying with refreshed token");
                            continue;
                        }
                        return Err(raw.to_error().into());
                    }
                    Ok(raw) => (ClientError::from(raw.to_error()), raw.retry_after()),
                    Err(e) => (e, None),
                };

            let retryable = matches!(&error, ClientError::Api(e) if e.is_retryable());
            if !(replayable && retryable) {
                return Err(error);
            }
            if attempt >= max_retries {
                warn!(%method, endpoint, attempts = attempt + 1, error = %error, "Retries exhausted");
                return Err(error);
            }

            let delay = self.inner.retry.delay_with_hint(attempt, retry_after);
            debug!(
                %method,
                endpoint,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                status = error.status_code(),
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Performs a single HTTP exchange.
    async fn send_once(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<&RequestBody>,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<RawResponse, ClientError> {
        let url = format!("{}{endpoint}", self.inner.base_url);
        let mut request = self
            .inner
            .http
            .request(method.clone(), url)
            .timeout(options.timeout.unwrap_or(self.inner.timeout));

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if is_mutating(method)
            && let Some(csrf) = self.inner.session.csrf_token()
        {
            request = request.header(CSRF_HEADER, csrf);
        }
        if let Some(key) = &options.idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        request = match body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(form)) => request.multipart(form.to_multipart()?),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from(network_error(&e)))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::from(network_error(&e)))?;

        Ok(RawResponse {
            status,
            headers,
            body,
            token: token.map(ToString::to_string),
        })
    }

    /// Renews the access token after a 401. Returns whether the request
    /// should be retried.
    ///
    /// Concurrent callers are serialised; a caller whose failed token was
    /// already replaced by another refresh reuses that token.
    async fn refresh_session(&self, failed_token: Option<&str>) -> bool {
        let refresher = self
            .inner
            .refresher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(refresher) = refresher else {
            return false;
        };

        let _guard = self.inner.refresh_lock.lock().await;
        let current = self.access_token();
        if current.is_some() && current.as_deref() != failed_token {
            return true;
        }

        let Some(token) = refresher.refresh().await else {
            warn!("Access token refresh failed");
            return false;
        };
        self.inner.session.set_access_token(Some(token));
        info!("Access token refreshed");

        if let Err(e) = self.fetch_csrf_token().await {
            warn!(error = %e, "CSRF token refresh failed after token refresh");
        }
        true
    }
}
