//! In-process fallback tier.
//!
//! Serves reads while the remote store is unreachable. Each entry stores its own
//! expiry instant and is dropped lazily when a read finds it stale; a periodic
//! sweep ([`FallbackCache::purge_expired`]) reclaims entries nobody reads again.
//! Total size is bounded by an LRU policy so key churn cannot grow the map
//! without limit.
//!
//! Time comes from [`tokio::time::Instant`], which follows a paused test clock.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::pattern::{glob_match, is_literal};

/// Default entry cap for the fallback tier.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Longest TTL the cache honours, one year. Longer TTLs are clamped.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Expiry instant `ttl` from now, with `ttl` clamped to [`MAX_TTL_SECS`].
pub(crate) fn deadline(ttl: Duration) -> Instant {
    let now = Instant::now();
    // `None` only if the clock itself sits near its upper bound
    now.checked_add(ttl.min(Duration::from_secs(MAX_TTL_SECS)))
        .unwrap_or(now)
}

#[derive(Debug, Clone)]
struct FallbackEntry {
    value: Arc<str>,
    expires_at: Instant,
}

impl FallbackEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Snapshot of fallback tier counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackStats {
    /// Live entries (may include expired entries not yet purged).
    pub entries: usize,
    /// Maximum entries before LRU eviction, `None` when unbounded.
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    /// Entries removed to make room under the cap.
    pub evictions: u64,
}

/// Bounded, TTL-aware in-memory cache of serialized values.
pub struct FallbackCache {
    entries: Mutex<LruCache<String, FallbackEntry>>,
    capacity: Option<NonZeroUsize>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl FallbackCache {
    /// Create a fallback cache holding at most `max_entries` entries.
    ///
    /// `0` disables the cap.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries);
        let entries = match capacity {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Get a live value, promoting it to most-recently-used.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value for `ttl`. A zero TTL stores nothing and drops any
    /// previous value for the key.
    pub fn set(&self, key: &str, value: Arc<str>, ttl: Duration) {
        let mut entries = self.entries.lock();
        if ttl.is_zero() {
            entries.pop(key);
            return;
        }

        let entry = FallbackEntry {
            value,
            expires_at: deadline(ttl),
        };
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %evicted, "fallback cache evicted LRU entry");
            }
        }
    }

    /// Remove a single key.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove every key matching a Redis-style glob pattern.
    ///
    /// Returns the number of entries removed.
    pub fn remove_matching(&self, pattern: &str) -> usize {
        if pattern == "*" {
            let mut entries = self.entries.lock();
            let removed = entries.len();
            entries.clear();
            return removed;
        }
        if is_literal(pattern) {
            return usize::from(self.delete(pattern));
        }

        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            self.expirations
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
        }
        expired.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            entries: self.len(),
            capacity: self.capacity.map(NonZeroUsize::get),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for FallbackCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for FallbackCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackCache")
            .field("entries", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Spawn a background task that purges expired fallback entries every `interval`.
///
/// The task stops when the returned handle is aborted or the runtime shuts down.
pub fn spawn_sweeper(cache: Arc<FallbackCache>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "purged expired fallback cache entries");
            }
        }
    })
}
