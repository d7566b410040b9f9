use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use storefront_cache::{MAX_TTL_SECS, ReconnectPolicy, RedisSettings};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }

        let level = self.logging.level.to_ascii_lowercase();
        let allowed = ["error", "warn", "info", "debug", "trace"];
        if !allowed.contains(&level.as_str()) {
            return Err(format!(
                "logging.level must be one of {allowed:?}, got '{}'",
                self.logging.level
            ));
        }

        if self.redis.enabled {
            let parsed = url::Url::parse(&self.redis.url)
                .map_err(|e| format!("redis.url is not a valid URL: {e}"))?;
            if !matches!(parsed.scheme(), "redis" | "rediss" | "redis+unix") {
                return Err(format!(
                    "redis.url must use the redis:// or rediss:// scheme, got '{}'",
                    parsed.scheme()
                ));
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
            if self.redis.retry_base_delay_ms > self.redis.retry_max_delay_ms {
                return Err("redis.retry_base_delay_ms must not exceed redis.retry_max_delay_ms".into());
            }
        }

        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs must be > 0".into());
        }
        if self.cache.default_ttl_secs > MAX_TTL_SECS {
            return Err(format!("cache.default_ttl_secs must be <= {MAX_TTL_SECS}"));
        }
        if self.cache.response_ttl_secs > MAX_TTL_SECS {
            return Err(format!("cache.response_ttl_secs must be <= {MAX_TTL_SECS}"));
        }
        if self.cache.max_cached_body_bytes == 0 {
            return Err("cache.max_cached_body_bytes must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".to_string()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis (remote cache tier) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the remote tier. When disabled the cache runs in local-only mode.
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Per-operation timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,

    /// Reconnect attempts before giving up
    #[serde(default = "default_redis_max_retries")]
    pub max_retries: u32,

    /// Reconnect delay grows by this much per attempt
    #[serde(default = "default_redis_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound of the reconnect delay
    #[serde(default = "default_redis_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

fn default_redis_max_retries() -> u32 {
    10
}

fn default_redis_retry_base_delay_ms() -> u64 {
    100
}

fn default_redis_retry_max_delay_ms() -> u64 {
    3000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
            max_retries: default_redis_max_retries(),
            retry_base_delay_ms: default_redis_retry_base_delay_ms(),
            retry_max_delay_ms: default_redis_retry_max_delay_ms(),
        }
    }
}

impl RedisConfig {
    pub fn settings(&self) -> RedisSettings {
        RedisSettings {
            url: self.url.clone(),
            pool_size: self.pool_size,
            operation_timeout: Duration::from_millis(self.timeout_ms),
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                max_retries: self.max_retries,
            },
            ..RedisSettings::default()
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL used when a caller does not pass one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// TTL of whole responses cached by the response-cache middleware
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,

    /// Maximum entries in the in-process fallback tier (0 = unbounded)
    #[serde(default = "default_local_cache_max_entries")]
    pub local_cache_max_entries: usize,

    /// Interval of the expired-entry sweep (0 = lazy expiry only)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Responses larger than this are passed through uncached
    #[serde(default = "default_max_cached_body_bytes")]
    pub max_cached_body_bytes: usize,
}

fn default_ttl_secs() -> u64 {
    storefront_cache::DEFAULT_TTL_SECS
}

fn default_response_ttl_secs() -> u64 {
    3600
}

fn default_local_cache_max_entries() -> usize {
    storefront_cache::fallback::DEFAULT_MAX_ENTRIES
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_cached_body_bytes() -> usize {
    512 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            response_ttl_secs: default_response_ttl_secs(),
            local_cache_max_entries: default_local_cache_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_cached_body_bytes: default_max_cached_body_bytes(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, read from the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., STOREFRONT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.redis.enabled);
        assert_eq!(cfg.cache.default_ttl_secs, 3600);
        assert_eq!(cfg.cache.local_cache_max_entries, 10_000);
    }

    #[test]
    fn test_rejects_bad_redis_url_only_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.redis.url = "http://localhost".into();
        assert!(cfg.validate().is_ok());

        cfg.redis.enabled = true;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("redis.url"), "{err}");
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_ttl_above_max() {
        let mut cfg = AppConfig::default();
        cfg.cache.response_ttl_secs = u64::MAX;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("response_ttl_secs"), "{err}");

        let mut cfg = AppConfig::default();
        cfg.cache.default_ttl_secs = MAX_TTL_SECS + 1;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("default_ttl_secs"), "{err}");

        cfg.cache.default_ttl_secs = MAX_TTL_SECS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_redis_settings_carry_reconnect_policy() {
        let cfg = RedisConfig {
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 500,
            max_retries: 3,
            ..RedisConfig::default()
        };
        let settings = cfg.settings();
        assert_eq!(settings.reconnect.base_delay, Duration::from_millis(50));
        assert_eq!(settings.reconnect.max_delay, Duration::from_millis(500));
        assert_eq!(settings.reconnect.max_retries, 3);
        assert_eq!(settings.operation_timeout, Duration::from_millis(5000));
    }
}
