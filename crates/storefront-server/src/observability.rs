//! Tracing setup driven by [`LoggingConfig`].

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Install the global subscriber at the configured level.
///
/// A parseable `RUST_LOG` overrides `logging.level`. Only the first call
/// installs a subscriber; later calls are no-ops.
pub fn init_tracing(cfg: &LoggingConfig) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let _ = tracing_subscriber::registry()
        .with(filter_for(cfg, rust_log.as_deref()))
        .with(fmt::layer())
        .try_init();
}

fn filter_for(cfg: &LoggingConfig, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(cfg.level.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
        }
    }

    #[test]
    fn test_configured_level_is_used() {
        let filter = filter_for(&logging("DEBUG"), None);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_rust_log_overrides_configured_level() {
        let filter = filter_for(&logging("info"), Some("warn,storefront_cache=trace"));
        let directives = filter.to_string();
        assert!(directives.contains("storefront_cache=trace"));
        assert!(!directives.contains("info"));
    }
}
