//! In-process [`RemoteStore`] with native TTL semantics.
//!
//! Stands in for Redis in tests and local development. It can be switched
//! "unreachable" to simulate an outage, and counts the calls it receives so
//! tests can assert which tier served a request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{CacheError, CacheResult};
use crate::fallback::deadline;
use crate::pattern::glob_match;
use crate::remote::RemoteStore;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Shared-nothing remote store double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, StoredValue>>,
    unreachable: AtomicBool,
    calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going down (`true`) or coming back (`false`).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.load(Ordering::SeqCst)
    }

    /// Number of operations received, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw stored value, bypassing reachability and call counting.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.data
            .lock()
            .get(key)
            .filter(|v| v.expires_at > now)
            .map(|v| v.value.clone())
    }

    /// Write a raw value directly, e.g. to simulate another process or a corrupt entry.
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.data.lock().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: deadline(ttl),
            },
        );
    }

    fn enter(&self) -> CacheResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.is_unreachable() {
            Err(CacheError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.enter()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        match data.get(key) {
            Some(v) if v.expires_at > now => Ok(Some(v.value.clone())),
            Some(_) => {
                data.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> CacheResult<()> {
        self.enter()?;
        if ttl_secs == 0 {
            return Err(CacheError::command("invalid expire time in 'setex' command"));
        }
        self.insert_raw(key, value, Duration::from_secs(ttl_secs));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.enter()?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.enter()?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .data
            .lock()
            .iter()
            .filter(|(key, v)| v.expires_at > now && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        self.enter()?;
        let mut data = self.data.lock();
        Ok(keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count() as u64)
    }

    async fn is_available(&self) -> bool {
        !self.is_unreachable()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
