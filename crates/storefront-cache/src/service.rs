//! Cache facade.
//!
//! [`CacheService`] is the only entry point consumers use. It decides which tier
//! serves a read, mirrors writes into both tiers, and swallows every tier
//! failure: a cache problem can slow a request down but never fail it.
//!
//! ## Read path
//!
//! ```text
//! get(key) ──► remote.get ──► Ok(Some) ──► parse ──► hit (remote)
//!                   │
//!                   ├───────► Ok(None) ──► miss   (fallback NOT consulted)
//!                   │
//!                   └───────► Err ──────► fallback.get ──► hit (fallback) / miss
//! ```
//!
//! The remote store is authoritative while it is reachable: other instances
//! write and invalidate through it, so a stale local copy must not resurrect a
//! deleted entry.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;
use crate::fallback::{FallbackCache, FallbackStats, MAX_TTL_SECS, spawn_sweeper};
use crate::remote::RemoteStore;
use crate::telemetry::{self, tier};

/// TTL applied by [`CacheService::set_default`] unless configured otherwise.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Which tiers a [`CacheService`] runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Remote store with in-process fallback.
    Tiered,
    /// No remote store configured; the fallback tier serves everything.
    LocalOnly,
}

impl std::fmt::Display for CacheMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheMode::Tiered => write!(f, "tiered"),
            CacheMode::LocalOnly => write!(f, "local"),
        }
    }
}

/// Facade statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub mode: CacheMode,
    /// Remote backend name, `None` in local-only mode.
    pub remote_backend: Option<&'static str>,
    pub remote_hits: u64,
    pub fallback_hits: u64,
    pub misses: u64,
    /// Tier errors swallowed by the facade.
    pub errors: u64,
    /// Share of `errors` raised by the remote tier.
    pub remote_errors: u64,
    pub fallback: FallbackStats,
}

impl CacheStats {
    /// Hit rate as a percentage over all lookups.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.remote_hits + self.fallback_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Keys removed by [`CacheService::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    /// Keys removed from the remote tier; `None` if the remote tier was skipped
    /// or failed.
    pub remote_removed: Option<u64>,
    pub fallback_removed: usize,
}

/// Result of a read-through lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    pub value: T,
    /// `true` if the value came from the cache rather than the loader.
    pub hit: bool,
}

#[derive(Default)]
struct Counters {
    remote_hits: AtomicU64,
    fallback_hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    remote_errors: AtomicU64,
}

struct Inner {
    remote: Option<Arc<dyn RemoteStore>>,
    fallback: Arc<FallbackCache>,
    default_ttl_secs: u64,
    counters: Counters,
}

/// Two-tier read-through cache handle. Cheap to clone.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<Inner>,
}

impl CacheService {
    /// Create a tiered cache over `remote` with the given fallback tier.
    pub fn new(remote: Arc<dyn RemoteStore>, fallback: FallbackCache) -> Self {
        Self::build(Some(remote), fallback, DEFAULT_TTL_SECS)
    }

    /// Create a cache that only uses the in-process tier.
    pub fn local_only(fallback: FallbackCache) -> Self {
        Self::build(None, fallback, DEFAULT_TTL_SECS)
    }

    pub fn builder() -> CacheServiceBuilder {
        CacheServiceBuilder::default()
    }

    fn build(remote: Option<Arc<dyn RemoteStore>>, fallback: FallbackCache, ttl: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                fallback: Arc::new(fallback),
                default_ttl_secs: ttl,
                counters: Counters::default(),
            }),
        }
    }

    pub fn mode(&self) -> CacheMode {
        if self.inner.remote.is_some() {
            CacheMode::Tiered
        } else {
            CacheMode::LocalOnly
        }
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.inner.default_ttl_secs
    }

    /// Look up `key` and deserialize it as `T`.
    ///
    /// Returns `None` on a miss, on any tier failure that leaves no fallback
    /// value, and on a payload that does not parse as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let (raw, served_by) = self.lookup(key).await?;
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    tier = served_by,
                    error = %e,
                    "Discarding unparseable cache entry"
                );
                self.record_error(served_by, "deserialize");
                self.delete(key).await;
                None
            }
        }
    }

    /// Raw bytes for `key` and the tier that served them.
    async fn lookup(&self, key: &str) -> Option<(Arc<str>, &'static str)> {
        if let Some(remote) = &self.inner.remote {
            match remote.get(key).await {
                Ok(Some(raw)) => {
                    tracing::debug!(key = %key, "cache hit (remote)");
                    self.inner.counters.remote_hits.fetch_add(1, Ordering::Relaxed);
                    telemetry::record_cache_hit(tier::REMOTE);
                    return Some((Arc::from(raw), tier::REMOTE));
                }
                Ok(None) => {
                    tracing::debug!(key = %key, "cache miss");
                    self.record_miss();
                    return None;
                }
                Err(e) => {
                    self.log_remote_error("GET", key, &e);
                }
            }
        }

        match self.inner.fallback.get(key) {
            Some(raw) => {
                tracing::debug!(key = %key, "cache hit (fallback)");
                self.inner
                    .counters
                    .fallback_hits
                    .fetch_add(1, Ordering::Relaxed);
                telemetry::record_cache_hit(tier::FALLBACK);
                Some((raw, tier::FALLBACK))
            }
            None => {
                tracing::debug!(key = %key, "cache miss (fallback)");
                self.record_miss();
                None
            }
        }
    }

    /// Store `value` under `key` for `ttl_secs` seconds in both tiers.
    ///
    /// The remote write is attempted first; the fallback write happens
    /// regardless of its outcome. A TTL of `0` stores nothing; TTLs above
    /// [`MAX_TTL_SECS`] are clamped.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) {
        let ttl_secs = ttl_secs.min(MAX_TTL_SECS);
        if ttl_secs == 0 {
            tracing::debug!(key = %key, "ttl is zero, not caching");
            return;
        }

        let raw: Arc<str> = match serde_json::to_string(value) {
            Ok(s) => Arc::from(s),
            Err(e) => {
                let e = CacheError::from(e);
                tracing::warn!(key = %key, error = %e, "Failed to serialize value for cache");
                self.record_error(tier::FALLBACK, "serialize");
                return;
            }
        };

        if let Some(remote) = &self.inner.remote {
            match remote.set_with_expiry(key, ttl_secs, &raw).await {
                Ok(()) => tracing::debug!(key = %key, ttl_secs, "cache set (remote)"),
                Err(e) => self.log_remote_error("SETEX", key, &e),
            }
        }

        self.inner
            .fallback
            .set(key, raw, Duration::from_secs(ttl_secs));
        telemetry::set_cache_entries(tier::FALLBACK, self.inner.fallback.len());
    }

    /// [`set`](Self::set) with the service's default TTL.
    pub async fn set_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.set(key, value, self.inner.default_ttl_secs).await;
    }

    /// Remove `key` from both tiers.
    pub async fn delete(&self, key: &str) {
        if let Some(remote) = &self.inner.remote {
            if let Err(e) = remote.delete(key).await {
                self.log_remote_error("DEL", key, &e);
            }
        }
        self.inner.fallback.delete(key);
        tracing::debug!(key = %key, "cache entry deleted");
    }

    /// Remove every key matching a glob `pattern` from both tiers.
    ///
    /// Partial failures are logged and not rolled back.
    pub async fn clear(&self, pattern: &str) -> ClearOutcome {
        let mut outcome = ClearOutcome::default();

        if let Some(remote) = &self.inner.remote {
            match remote.keys_matching(pattern).await {
                Ok(keys) => match remote.delete_many(&keys).await {
                    Ok(removed) => {
                        telemetry::record_invalidation(tier::REMOTE, removed);
                        outcome.remote_removed = Some(removed);
                    }
                    Err(e) => self.log_remote_error("DEL", pattern, &e),
                },
                Err(e) => self.log_remote_error("SCAN", pattern, &e),
            }
        }

        outcome.fallback_removed = self.inner.fallback.remove_matching(pattern);
        telemetry::record_invalidation(tier::FALLBACK, outcome.fallback_removed as u64);
        telemetry::set_cache_entries(tier::FALLBACK, self.inner.fallback.len());

        tracing::debug!(
            pattern = %pattern,
            remote_removed = ?outcome.remote_removed,
            fallback_removed = outcome.fallback_removed,
            "cache cleared"
        );
        outcome
    }

    /// [`clear`](Self::clear) with the match-everything pattern.
    pub async fn clear_all(&self) -> ClearOutcome {
        self.clear("*").await
    }

    /// Read-through helper: return the cached value for `key`, or run `load`,
    /// cache its result for `ttl_secs`, and return it.
    ///
    /// Loader errors are returned untouched and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_secs: u64,
        load: F,
    ) -> Result<Lookup<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(Lookup { value, hit: true });
        }

        let value = load().await?;
        self.set(key, &value, ttl_secs).await;
        Ok(Lookup { value, hit: false })
    }

    /// Whether the remote tier currently accepts commands.
    pub async fn is_remote_available(&self) -> bool {
        match &self.inner.remote {
            Some(remote) => remote.is_available().await,
            None => false,
        }
    }

    /// Start a background sweep of expired fallback entries.
    pub fn spawn_fallback_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        spawn_sweeper(Arc::clone(&self.inner.fallback), interval)
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            mode: self.mode(),
            remote_backend: self.inner.remote.as_ref().map(|r| r.name()),
            remote_hits: c.remote_hits.load(Ordering::Relaxed),
            fallback_hits: c.fallback_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            remote_errors: c.remote_errors.load(Ordering::Relaxed),
            fallback: self.inner.fallback.stats(),
        }
    }

    fn record_miss(&self) {
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        telemetry::record_cache_miss();
    }

    fn record_error(&self, tier: &'static str, op: &'static str) {
        self.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
        if tier == tier::REMOTE {
            self.inner
                .counters
                .remote_errors
                .fetch_add(1, Ordering::Relaxed);
        }
        telemetry::record_cache_error(tier, op);
    }

    fn log_remote_error(&self, op: &'static str, key: &str, e: &CacheError) {
        self.record_error(tier::REMOTE, op);
        match e {
            // Fail-fast while reconnecting; the state change itself is logged once
            CacheError::Unavailable => {
                tracing::debug!(op, key = %key, "remote cache unavailable, using fallback")
            }
            _ => tracing::warn!(op, key = %key, error = %e, "remote cache error"),
        }
    }
}

/// Builder for [`CacheService`].
pub struct CacheServiceBuilder {
    remote: Option<Arc<dyn RemoteStore>>,
    fallback_max_entries: usize,
    default_ttl_secs: u64,
}

impl Default for CacheServiceBuilder {
    fn default() -> Self {
        Self {
            remote: None,
            fallback_max_entries: crate::fallback::DEFAULT_MAX_ENTRIES,
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl CacheServiceBuilder {
    /// Use `remote` as the shared tier. Without one the service runs local-only.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Entry cap of the fallback tier, `0` for unbounded.
    pub fn with_fallback_capacity(mut self, max_entries: usize) -> Self {
        self.fallback_max_entries = max_entries;
        self
    }

    /// TTL used by [`CacheService::set_default`].
    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    pub fn build(self) -> CacheService {
        CacheService::build(
            self.remote,
            FallbackCache::new(self.fallback_max_entries),
            self.default_ttl_secs,
        )
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("mode", &self.mode())
            .field("fallback", &self.inner.fallback)
            .field("default_ttl_secs", &self.inner.default_ttl_secs)
            .finish()
    }
}
