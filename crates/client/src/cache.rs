//! Response caching using Moka.
//!
//! GET responses are cached per method, endpoint, bearer token and extra
//! request headers, each with the TTL of the first matching endpoint rule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use paciolus_shared::{CacheConfig, path_matches};
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

/// A cached response body.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Endpoint the response was fetched from, including any query.
    pub endpoint: String,
    /// Response body.
    pub data: Arc<Value>,
    /// When the entry was stored.
    pub inserted_at: Instant,
    /// Lifetime of the entry.
    pub ttl: Duration,
}

impl CachedResponse {
    /// Whether the entry may still be served.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held.
    pub entry_count: u64,
    /// Configured capacity.
    pub max_entries: u64,
}

/// Expires every entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, CachedResponse> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedResponse,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// LRU response cache with per-endpoint TTLs.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, CachedResponse>,
    config: Arc<CacheConfig>,
}

impl ResponseCache {
    /// Creates a cache from configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self {
            cache,
            config: Arc::new(config),
        }
    }

    /// Builds the cache key for a request.
    ///
    /// The bearer token is folded in as a SHA-256 fingerprint so that
    /// responses never leak between sessions. Extra request headers are
    /// fingerprinted too, independent of their order and name case.
    #[must_use]
    pub fn key(
        method: &Method,
        endpoint: &str,
        token: Option<&str>,
        headers: &[(String, String)],
    ) -> String {
        let token = token.map_or_else(|| "anon".to_string(), fingerprint);
        if headers.is_empty() {
            return format!("{method} {endpoint}#{token}");
        }

        let mut pairs: Vec<(String, &str)> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
            .collect();
        pairs.sort_unstable();
        let signature = pairs
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect::<String>();
        format!("{method} {endpoint}#{token}#{}", fingerprint(&signature))
    }

    /// Returns the cached body for `key` if it is still fresh.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.cache
            .get(key)
            .await
            .filter(CachedResponse::is_fresh)
            .map(|entry| entry.data)
    }

    /// Stores a response under `key`. Endpoints with a zero TTL are not cached.
    pub async fn insert(&self, key: String, endpoint: &str, data: Arc<Value>) {
        let ttl = self.config.ttl_for(endpoint);
        if ttl.is_zero() {
            return;
        }
        let entry = CachedResponse {
            endpoint: endpoint.to_string(),
            data,
            inserted_at: Instant::now(),
            ttl,
        };
        self.cache.insert(key, entry).await;
    }

    /// Drops every entry whose endpoint is `prefix` or lies below it.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let prefix = prefix.trim_end_matches('/').to_string();
        let result = self
            .cache
            .invalidate_entries_if(move |_, entry| path_matches(&entry.endpoint, &prefix));
        if let Err(e) = result {
            warn!(error = %e, "Cache prefix invalidation rejected, clearing cache");
            self.cache.invalidate_all();
        }
    }

    /// Drops entries affected by a successful mutation of `endpoint`:
    /// its base path (query stripped) and that path's parent collection.
    pub fn invalidate_for_mutation(&self, endpoint: &str) {
        for prefix in mutation_prefixes(endpoint) {
            self.invalidate_prefix(&prefix);
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Runs pending maintenance (expiry, invalidation, eviction).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Returns the current occupancy.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            max_entries: self.config.max_entries,
        }
    }
}

/// Hex SHA-256 of a bearer token or header signature.
fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn mutation_prefixes(endpoint: &str) -> Vec<String> {
    let base = endpoint
        .split(['?', '#'])
        .next()
        .unwrap_or(endpoint)
        .trim_end_matches('/');
    let mut prefixes = vec![base.to_string()];
    if let Some((parent, _)) = base.rsplit_once('/')
        && !parent.is_empty()
    {
        prefixes.push(parent.to_string());
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use paciolus_shared::EndpointTtl;
    use rstest::rstest;
    use serde_json::json;

    fn config() -> CacheConfig {
        CacheConfig {
            max_entries: 10,
            default_ttl_secs: 60,
            endpoint_ttls: vec![
                EndpointTtl::new("/activity", 0),
                EndpointTtl::new("/clients", 300),
            ],
        }
    }

    async fn seed(cache: &ResponseCache, endpoint: &str) -> String {
        let key = ResponseCache::key(&Method::GET, endpoint, Some("token"), &[]);
        cache
            .insert(key.clone(), endpoint, Arc::new(json!({"endpoint": endpoint})))
            .await;
        key
    }

    #[rstest]
    #[case("/clients", "/clients", true)]
    #[case("/clients/7", "/clients", true)]
    #[case("/clients?page=2", "/clients", true)]
    #[case("/clients-archive", "/clients", false)]
    #[case("/settings", "/clients", false)]
    #[case("/anything", "", true)]
    fn test_path_matches(#[case] endpoint: &str, #[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(path_matches(endpoint, prefix), expected);
    }

    #[rstest]
    #[case("/clients/7?include=periods", &["/clients/7", "/clients"])]
    #[case("/clients/", &["/clients"])]
    #[case("/engagements/3/tasks/9", &["/engagements/3/tasks/9", "/engagements/3/tasks"])]
    fn test_mutation_prefixes(#[case] endpoint: &str, #[case] expected: &[&str]) {
        assert_eq!(mutation_prefixes(endpoint), expected);
    }

    #[test]
    fn test_key_isolates_tokens() {
        let anon = ResponseCache::key(&Method::GET, "/clients", None, &[]);
        let alice = ResponseCache::key(&Method::GET, "/clients", Some("alice"), &[]);
        let bob = ResponseCache::key(&Method::GET, "/clients", Some("bob"), &[]);

        assert!(anon.ends_with("#anon"));
        assert_ne!(alice, bob);
        assert!(!alice.contains("alice"));
    }

    #[test]
    fn test_key_includes_header_signature() {
        let header = |name: &str, value: &str| (name.to_string(), value.to_string());
        let plain = ResponseCache::key(&Method::GET, "/report", None, &[]);
        let json = ResponseCache::key(
            &Method::GET,
            "/report",
            None,
            &[header("Accept", "application/json")],
        );
        let csv = ResponseCache::key(&Method::GET, "/report", None, &[header("Accept", "text/csv")]);
        let both = ResponseCache::key(
            &Method::GET,
            "/report",
            None,
            &[header("Accept", "text/csv"), header("X-Client", "preview")],
        );
        let reordered = ResponseCache::key(
            &Method::GET,
            "/report",
            None,
            &[header("x-client", "preview"), header("accept", "text/csv")],
        );

        assert_ne!(plain, json);
        assert_ne!(json, csv);
        assert_eq!(both, reordered);
        assert!(!csv.contains("text/csv"));
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = ResponseCache::new(config());
        let key = seed(&cache, "/clients").await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(*hit, json!({"endpoint": "/clients"}));
        assert!(cache.get("GET /missing#anon").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_cached() {
        let cache = ResponseCache::new(config());
        let key = seed(&cache, "/activity").await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_for_mutation() {
        let cache = ResponseCache::new(config());
        let list = seed(&cache, "/clients").await;
        let item = seed(&cache, "/clients/7").await;
        let other = seed(&cache, "/clients/8/periods").await;
        let settings = seed(&cache, "/settings").await;

        cache.invalidate_for_mutation("/clients/7?force=true");
        cache.run_pending_tasks().await;

        assert!(cache.get(&list).await.is_none());
        assert!(cache.get(&item).await.is_none());
        assert!(cache.get(&other).await.is_none());
        assert!(cache.get(&settings).await.is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ResponseCache::new(config());
        let key = seed(&cache, "/clients").await;

        cache.clear();
        cache.run_pending_tasks().await;

        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.stats().max_entries, 10);
    }

    #[test]
    fn test_expired_entry_is_stale() {
        let entry = CachedResponse {
            endpoint: "/clients".to_string(),
            data: Arc::new(Value::Null),
            inserted_at: Instant::now(),
            ttl: Duration::ZERO,
        };
        assert!(!entry.is_fresh());
    }
}
