use std::{env, fs};

use storefront_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("storefront.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 2048

[logging]
level = "debug"

[redis]
enabled = true
url = "redis://cache.internal:6380/2"
pool_size = 4
timeout_ms = 750

[cache]
default_ttl_secs = 600
local_cache_max_entries = 500
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, unset keys keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.body_limit_bytes, 2048);
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.redis.enabled);
    assert_eq!(cfg.redis.pool_size, 4);
    assert_eq!(cfg.redis.retry_max_delay_ms, 3000);
    assert_eq!(cfg.cache.default_ttl_secs, 600);
    assert_eq!(cfg.cache.local_cache_max_entries, 500);
    assert_eq!(cfg.cache.response_ttl_secs, 3600);

    // 2) Env override should win over file
    unsafe {
        env::set_var("STOREFRONT__CACHE__DEFAULT_TTL_SECS", "42");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cache.default_ttl_secs, 42);
    // cleanup env var
    unsafe {
        env::remove_var("STOREFRONT__CACHE__DEFAULT_TTL_SECS");
    }

    // 3) Invalid config (non-redis URL) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[redis]
enabled = true
url = "http://localhost:6379"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("redis.url must use"));

    // 4) Retry delays must be ordered
    let backoff_path = dir.path().join("backoff.toml");
    let backoff_toml = r#"
[redis]
enabled = true
retry_base_delay_ms = 5000
retry_max_delay_ms = 100
"#;
    fs::write(&backoff_path, backoff_toml).expect("write backoff toml");
    let err = load_config(backoff_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("retry_base_delay_ms"));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert!(!cfg.redis.enabled);
    assert_eq!(cfg.server.port, 5000);
}
