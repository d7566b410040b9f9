//! Remote (shared) cache tier.
//!
//! [`RemoteStore`] abstracts the network key-value store so the facade can be
//! exercised against an in-process double. [`RedisStore`] is the production
//! implementation on top of a `deadpool-redis` pool.
//!
//! ## Connection lifecycle
//!
//! ```text
//!              connection failure              retry succeeds
//! Connected ───────────────────────► Reconnecting ───────────► Connected
//!                                        │
//!                                        │ max_retries exhausted
//!                                        ▼
//!                                      GaveUp
//! ```
//!
//! Only connection acquisition drives the state machine. While the store is
//! `Reconnecting` or `GaveUp` every call fails fast with
//! [`CacheError::Unavailable`]; individual commands are never retried.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use redis::{AsyncCommands, RedisResult};

use crate::error::{CacheError, CacheResult};

/// Operations the facade needs from the remote tier.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the raw stored string, `None` if the key does not exist.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl_secs` seconds.
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> CacheResult<()>;

    /// Delete a single key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Enumerate keys matching a glob pattern.
    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Delete a batch of keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    /// Whether the store currently accepts commands (for health checks).
    async fn is_available(&self) -> bool;

    /// Short backend name for logs and stats.
    fn name(&self) -> &'static str;
}

/// Reconnect backoff policy.
///
/// The delay before attempt `n` (1-based) is `base_delay × n`, capped at `max_delay`.
/// After `max_retries` failed attempts the client stops reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl ReconnectPolicy {
    /// Delay to wait before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(3000),
            max_retries: 10,
        }
    }
}

/// Connection state of a [`RedisStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    GaveUp,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Reconnecting,
            _ => ConnectionState::GaveUp,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connected => 0,
            ConnectionState::Reconnecting => 1,
            ConnectionState::GaveUp => 2,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::GaveUp => write!(f, "gave-up"),
        }
    }
}

/// Settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Connection URL, e.g. `redis://:password@localhost:6379/0`
    pub url: String,
    pub pool_size: usize,
    /// Timeout for acquiring a connection and for each command.
    pub operation_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    /// `COUNT` hint for `SCAN` iterations.
    pub scan_count: usize,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            operation_timeout: Duration::from_millis(5000),
            reconnect: ReconnectPolicy::default(),
            scan_count: 100,
        }
    }
}

/// Number of keys passed to a single `DEL`.
const DELETE_CHUNK: usize = 500;

/// Redis-backed remote store.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    settings: Arc<RedisSettings>,
    state: Arc<AtomicU8>,
}

impl RedisStore {
    /// Build the pool and ping the server once.
    ///
    /// A failed ping does not fail construction: the store starts in
    /// `Reconnecting` and recovers in the background, while the facade serves
    /// from the fallback tier.
    pub async fn connect(settings: RedisSettings) -> CacheResult<Self> {
        let mut pool_config = PoolConfig::from_url(&settings.url);
        if let Some(ref mut pool) = pool_config.pool {
            pool.max_size = settings.pool_size;
            pool.timeouts.wait = Some(settings.operation_timeout);
            pool.timeouts.create = Some(settings.operation_timeout);
            pool.timeouts.recycle = Some(settings.operation_timeout);
        } else {
            let mut pool = deadpool_redis::PoolConfig::new(settings.pool_size);
            pool.timeouts.wait = Some(settings.operation_timeout);
            pool.timeouts.create = Some(settings.operation_timeout);
            pool.timeouts.recycle = Some(settings.operation_timeout);
            pool_config.pool = Some(pool);
        }

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::connection(format!("failed to create Redis pool: {e}")))?;

        let store = Self {
            pool,
            settings: Arc::new(settings),
            state: Arc::new(AtomicU8::new(ConnectionState::Connected.as_u8())),
        };

        match store.ping().await {
            Ok(()) => tracing::info!(url = %redact(&store.settings.url), "Connected to Redis"),
            Err(e) => {
                tracing::warn!(
                    url = %redact(&store.settings.url),
                    error = %e,
                    "Initial Redis connection failed, serving from fallback cache"
                );
                store.connection_lost();
            }
        }

        Ok(store)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    async fn ping(&self) -> CacheResult<()> {
        let timeout = self.settings.operation_timeout;
        let pool = self.pool.clone();
        let result = tokio::time::timeout(timeout, async move {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| CacheError::connection(e.to_string()))?;
            let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
            pong.map(|_| ()).map_err(CacheError::from)
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(CacheError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        }
    }

    /// Transition `Connected → Reconnecting` and start the reconnect loop.
    ///
    /// Only the caller that wins the transition spawns the loop.
    fn connection_lost(&self) {
        let swapped = self.state.compare_exchange(
            ConnectionState::Connected.as_u8(),
            ConnectionState::Reconnecting.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_err() {
            return;
        }

        let store = self.clone();
        tokio::spawn(async move {
            let policy = store.settings.reconnect;
            for attempt in 1..=policy.max_retries {
                let delay = policy.delay_for(attempt);
                tokio::time::sleep(delay).await;

                match store.ping().await {
                    Ok(()) => {
                        store
                            .state
                            .store(ConnectionState::Connected.as_u8(), Ordering::Release);
                        tracing::info!(attempt, "Reconnected to Redis");
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            max_retries = policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Redis reconnect attempt failed"
                        );
                    }
                }
            }

            store
                .state
                .store(ConnectionState::GaveUp.as_u8(), Ordering::Release);
            tracing::error!(
                max_retries = policy.max_retries,
                "Giving up on Redis reconnection; remote cache disabled until restart"
            );
        });
    }

    /// Acquire a connection and run `op` on it, bounded by the operation timeout.
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> CacheResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        if self.state() != ConnectionState::Connected {
            return Err(CacheError::Unavailable);
        }

        let timeout = self.settings.operation_timeout;
        let pool = &self.pool;
        let result = tokio::time::timeout(timeout, async move {
            let conn = pool
                .get()
                .await
                .map_err(|e| CacheError::connection(e.to_string()))?;
            f(conn).await.map_err(CacheError::from)
        })
        .await
        .unwrap_or(Err(CacheError::Timeout {
            millis: timeout.as_millis() as u64,
        }));

        if let Err(ref e) = result {
            if e.is_connectivity() {
                tracing::warn!(op, error = %e, "Redis connection failure");
                self.connection_lost();
            }
        }
        result
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.run("GET", |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> CacheResult<()> {
        self.run("SETEX", |mut conn| async move {
            conn.set_ex::<_, _, ()>(key, value, ttl_secs).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.run("DEL", |mut conn| async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let count = self.settings.scan_count;
        self.run("SCAN", |mut conn| async move {
            let mut keys = Vec::new();
            let mut cursor: u64 = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query_async(&mut conn)
                    .await?;
                keys.extend(batch);
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
            // SCAN may return a key more than once
            keys.sort_unstable();
            keys.dedup();
            Ok(keys)
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run("DEL", |mut conn| async move {
            let mut deleted = 0u64;
            for chunk in keys.chunks(DELETE_CHUNK) {
                deleted += conn.del::<_, u64>(chunk).await?;
            }
            Ok(deleted)
        })
        .await
    }

    async fn is_available(&self) -> bool {
        self.state() == ConnectionState::Connected && self.ping().await.is_ok()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Strip credentials from a Redis URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(5), Duration::from_millis(500));
        assert_eq!(policy.delay_for(30), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(3000));
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::GaveUp,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ConnectionState::GaveUp.to_string(), "gave-up");
    }

    #[test]
    fn test_redact_credentials() {
        assert_eq!(
            redact("redis://:s3cret@cache.internal:6379/0"),
            "redis://***@cache.internal:6379/0"
        );
        assert_eq!(redact("redis://localhost:6379"), "redis://localhost:6379");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_server_fails_fast_then_gives_up() {
        let settings = RedisSettings {
            // Port 1 on loopback refuses connections immediately
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            operation_timeout: Duration::from_millis(200),
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(30),
                max_retries: 3,
            },
            scan_count: 10,
        };

        let store = RedisStore::connect(settings).await.expect("pool builds");
        assert_ne!(store.state(), ConnectionState::Connected);

        // Fails fast without touching the network
        assert!(matches!(
            store.get("product:1").await,
            Err(CacheError::Unavailable)
        ));

        // Reconnect loop gives up after max_retries
        for _ in 0..100 {
            if store.state() == ConnectionState::GaveUp {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(store.state(), ConnectionState::GaveUp);
        assert!(!store.is_available().await);
    }
}
