//! Client configuration management.

use std::time::Duration;

use serde::Deserialize;

/// Environment variable the web frontend used for the backend URL.
///
/// Honoured when `PACIOLUS__API__BASE_URL` is not set.
pub const LEGACY_API_URL_VAR: &str = "NEXT_PUBLIC_API_URL";

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Backend API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Response cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// TTL override for endpoints starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointTtl {
    /// Endpoint prefix, e.g. `/clients`.
    pub prefix: String,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

impl EndpointTtl {
    /// Creates a new TTL rule.
    #[must_use]
    pub fn new(prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            prefix: prefix.into(),
            ttl_secs,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached responses.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// TTL for endpoints that match no rule, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Per-endpoint TTL rules. The first matching prefix wins.
    #[serde(default = "default_endpoint_ttls")]
    pub endpoint_ttls: Vec<EndpointTtl>,
}

fn default_max_entries() -> u64 {
    100
}

fn default_ttl_secs() -> u64 {
    60
}

fn default_endpoint_ttls() -> Vec<EndpointTtl> {
    vec![
        EndpointTtl::new("/users/me", 300),
        EndpointTtl::new("/settings", 600),
        EndpointTtl::new("/clients", 300),
        EndpointTtl::new("/audit/lead-sheets", 300),
        EndpointTtl::new("/diagnostics/summary", 120),
        EndpointTtl::new("/activity", 60),
    ]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl_secs: default_ttl_secs(),
            endpoint_ttls: default_endpoint_ttls(),
        }
    }
}

impl CacheConfig {
    /// Returns the TTL that applies to `endpoint`.
    #[must_use]
    pub fn ttl_for(&self, endpoint: &str) -> Duration {
        let secs = self
            .endpoint_ttls
            .iter()
            .find(|rule| path_matches(endpoint, rule.prefix.trim_end_matches('/')))
            .map_or(self.default_ttl_secs, |rule| rule.ttl_secs);
        Duration::from_secs(secs)
    }
}

/// Segment-aware prefix match: `/clients` covers `/clients`, `/clients/7`
/// and `/clients?page=2` but not `/clients-archive`.
#[must_use]
pub fn path_matches(endpoint: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    endpoint.strip_prefix(prefix).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')
    })
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, lowest precedence first: `config/default`, `config/{RUN_MODE}`,
    /// `NEXT_PUBLIC_API_URL`, `PACIOLUS__*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let legacy_url = std::env::var("PACIOLUS__API__BASE_URL")
            .is_err()
            .then(|| std::env::var(LEGACY_API_URL_VAR).ok())
            .flatten();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("PACIOLUS").separator("__"))
            .set_override_option("api.base_url", legacy_url)?
            .build()?;

        let mut loaded: Self = config.try_deserialize()?;
        loaded.api.base_url = loaded.api.base_url.trim_end_matches('/').to_string();
        Ok(loaded)
    }
}
