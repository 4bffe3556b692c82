//! HTTP response caching.
//!
//! The [`CacheNegotiator`] maps between [`CacheSnapshot`]s and HTTP
//! validators. It imposes one uniform client-side lifetime and ignores
//! origin `Cache-Control` directives.

use crate::network::NetworkResponse;
use bytes::Bytes;
use dashmap::DashMap;
use http::header::{DATE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, HeaderValue, Method};
use std::time::{Duration, SystemTime};

/// Default lifetime of a cached response (8 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(8 * 60 * 60);

/// Lifetime used when the configured one is zero (1 hour)
pub const FALLBACK_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default entry cap of [`MemoryCacheStore`]
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 1024;

/// Store key of a response: method and fully resolved URL.
///
/// A `HEAD` response carries no body and must never answer a `GET`.
#[must_use]
pub fn cache_key(method: &Method, url: &str) -> String {
    format!("{method} {url}")
}

/// Cached copy of a prior response plus its validators.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub data: Bytes,
    pub etag: Option<String>,
    /// Origin `Date` header, echoed as `If-Modified-Since`.
    pub server_date: Option<SystemTime>,
    pub soft_expires_at: SystemTime,
    pub expires_at: SystemTime,
    pub response_headers: HeaderMap,
}

impl CacheSnapshot {
    /// Past the hard expiry: must not be served without revalidation.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Past the soft expiry: may be served but should be revalidated.
    #[must_use]
    pub fn needs_refresh(&self, now: SystemTime) -> bool {
        now >= self.soft_expires_at
    }
}

impl Default for CacheSnapshot {
    fn default() -> Self {
        Self {
            data: Bytes::new(),
            etag: None,
            server_date: None,
            soft_expires_at: SystemTime::UNIX_EPOCH,
            expires_at: SystemTime::UNIX_EPOCH,
            response_headers: HeaderMap::new(),
        }
    }
}

/// Keyed snapshot storage.
///
/// Implementations must be safe to read concurrently; writes for one key
/// never affect another key.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheSnapshot>;
    fn put(&self, key: &str, snapshot: CacheSnapshot);
    fn remove(&self, key: &str);
}

/// In-process cache store holding at most `max_entries` snapshots.
///
/// Inserting a new key into a full store first drops expired snapshots,
/// then the ones closest to expiry.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheSnapshot>,
    max_entries: usize,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_CACHE_ENTRIES)
    }

    /// `max_entries` is clamped to at least one.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn make_room(&self, now: SystemTime) {
        let before = self.entries.len();
        self.entries.retain(|_, snapshot| !snapshot.is_expired(now));
        while self.entries.len() >= self.max_entries {
            let soonest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().expires_at)
                .map(|entry| entry.key().clone());
            let Some(key) = soonest else { break };
            self.entries.remove(&key);
        }
        tracing::trace!(
            evicted = before.saturating_sub(self.entries.len()),
            max_entries = self.max_entries,
            "Cache store full, evicted entries"
        );
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<CacheSnapshot> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, snapshot: CacheSnapshot) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            self.make_room(SystemTime::now());
        }
        self.entries.insert(key.to_owned(), snapshot);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Store that never retains anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl CacheStore for NoCache {
    fn get(&self, _key: &str) -> Option<CacheSnapshot> {
        None
    }

    fn put(&self, _key: &str, _snapshot: CacheSnapshot) {}

    fn remove(&self, _key: &str) {}
}

/// Builds conditional headers from snapshots and snapshots from responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheNegotiator {
    ttl: Duration,
}

impl CacheNegotiator {
    /// A zero `ttl` falls back to [`FALLBACK_CACHE_TTL`].
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { FALLBACK_CACHE_TTL } else { ttl };
        Self { ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `If-None-Match` / `If-Modified-Since` for a prior snapshot.
    #[must_use]
    pub fn conditional_headers(snapshot: Option<&CacheSnapshot>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(snapshot) = snapshot else {
            return headers;
        };

        if let Some(etag) = &snapshot.etag {
            match HeaderValue::from_str(etag) {
                Ok(value) => {
                    headers.insert(IF_NONE_MATCH, value);
                }
                Err(_) => tracing::debug!(etag = %etag, "Skipping unusable cached ETag"),
            }
        }
        if let Some(date) = snapshot.server_date {
            let formatted = httpdate::fmt_http_date(date);
            if let Ok(value) = HeaderValue::from_str(&formatted) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }
        headers
    }

    /// Snapshot of a successful or `304`-refreshed response.
    ///
    /// Soft and hard expiry are both `now + ttl`.
    #[must_use]
    pub fn snapshot_from(&self, response: &NetworkResponse, now: SystemTime) -> CacheSnapshot {
        let etag = response
            .headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let server_date = response
            .headers
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| httpdate::parse_http_date(s).ok());
        let expires_at = now + self.ttl;

        CacheSnapshot {
            data: response.data.clone(),
            etag,
            server_date,
            soft_expires_at: expires_at,
            expires_at,
            response_headers: response.headers.clone(),
        }
    }
}

impl Default for CacheNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::StatusCode;

    fn response_with(headers: &[(http::HeaderName, &'static str)]) -> NetworkResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        NetworkResponse::new(StatusCode::OK, Bytes::from_static(b"payload"), map)
    }

    #[test]
    fn test_no_snapshot_no_conditional_headers() {
        assert!(CacheNegotiator::conditional_headers(None).is_empty());
    }

    #[test]
    fn test_conditional_headers_from_snapshot() {
        let date = httpdate::parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        let snapshot = CacheSnapshot {
            etag: Some("\"abc\"".to_owned()),
            server_date: Some(date),
            ..CacheSnapshot::default()
        };

        let headers = CacheNegotiator::conditional_headers(Some(&snapshot));
        assert_eq!(headers[IF_NONE_MATCH], "\"abc\"");
        assert_eq!(headers[IF_MODIFIED_SINCE], "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_etag_only_snapshot() {
        let snapshot = CacheSnapshot {
            etag: Some("W/\"v2\"".to_owned()),
            ..CacheSnapshot::default()
        };
        let headers = CacheNegotiator::conditional_headers(Some(&snapshot));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[IF_NONE_MATCH], "W/\"v2\"");
    }

    #[test]
    fn test_snapshot_copies_validators_and_sets_uniform_expiry() {
        let negotiator = CacheNegotiator::new(Duration::from_secs(60));
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let response = response_with(&[
            (ETAG, "\"abc\""),
            (DATE, "Sun, 06 Nov 1994 08:49:37 GMT"),
            (http::header::CACHE_CONTROL, "no-store"),
        ]);

        let snapshot = negotiator.snapshot_from(&response, now);
        assert_eq!(snapshot.data.as_ref(), b"payload");
        assert_eq!(snapshot.etag.as_deref(), Some("\"abc\""));
        assert!(snapshot.server_date.is_some());
        assert_eq!(snapshot.expires_at, now + Duration::from_secs(60));
        assert_eq!(snapshot.soft_expires_at, snapshot.expires_at);
    }

    #[test]
    fn test_zero_ttl_falls_back_to_one_hour() {
        assert_eq!(CacheNegotiator::new(Duration::ZERO).ttl(), FALLBACK_CACHE_TTL);
        assert_eq!(CacheNegotiator::default().ttl(), DEFAULT_CACHE_TTL);
    }

    #[test]
    fn test_expiry_checks() {
        let now = SystemTime::now();
        let snapshot = CacheSnapshot {
            soft_expires_at: now + Duration::from_secs(10),
            expires_at: now + Duration::from_secs(10),
            ..CacheSnapshot::default()
        };
        assert!(!snapshot.is_expired(now));
        assert!(snapshot.is_expired(now + Duration::from_secs(10)));
        assert!(!snapshot.needs_refresh(now));
    }

    #[test]
    fn test_memory_store_put_get_remove() {
        let store = MemoryCacheStore::new();
        store.put("https://a/x", CacheSnapshot::default());
        assert_eq!(store.len(), 1);
        assert!(store.get("https://a/x").is_some());
        store.remove("https://a/x");
        assert!(store.is_empty());
        assert!(NoCache.get("https://a/x").is_none());
    }

    #[test]
    fn test_cache_key_separates_methods() {
        let url = "https://a/items";
        assert_eq!(cache_key(&Method::GET, url), "GET https://a/items");
        assert_ne!(cache_key(&Method::HEAD, url), cache_key(&Method::GET, url));
    }

    fn expiring_at(secs_from_now: u64) -> CacheSnapshot {
        let at = SystemTime::now() + Duration::from_secs(secs_from_now);
        CacheSnapshot {
            soft_expires_at: at,
            expires_at: at,
            ..CacheSnapshot::default()
        }
    }

    #[test]
    fn test_full_store_drops_expired_entries_first() {
        let store = MemoryCacheStore::with_max_entries(3);
        store.put("stale-1", CacheSnapshot::default());
        store.put("stale-2", CacheSnapshot::default());
        store.put("live", expiring_at(60));

        store.put("new", expiring_at(60));

        assert_eq!(store.len(), 2);
        assert!(store.get("live").is_some());
        assert!(store.get("new").is_some());
        assert!(store.get("stale-1").is_none());
    }

    #[test]
    fn test_full_store_evicts_soonest_expiry() {
        let store = MemoryCacheStore::with_max_entries(2);
        store.put("short", expiring_at(10));
        store.put("long", expiring_at(600));

        store.put("new", expiring_at(300));

        assert_eq!(store.len(), 2);
        assert!(store.get("short").is_none());
        assert!(store.get("long").is_some());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn test_overwriting_key_in_full_store_keeps_others() {
        let store = MemoryCacheStore::with_max_entries(2);
        store.put("a", expiring_at(10));
        store.put("b", expiring_at(20));

        store.put("a", expiring_at(30));

        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_some());
        assert_eq!(MemoryCacheStore::with_max_entries(0).max_entries(), 1);
    }
}
