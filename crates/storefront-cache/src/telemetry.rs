//! Cache metrics.
//!
//! Recorded through the `metrics` facade; the server installs a Prometheus
//! recorder, tests run without one (recording is then a no-op).

use ::metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "cache_errors_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "cache_invalidations_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
}

/// Tier label values.
pub mod tier {
    pub const REMOTE: &str = "remote";
    pub const FALLBACK: &str = "fallback";
}

/// Record a cache hit served by `tier`.
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a swallowed tier error for operation `op`.
pub fn record_cache_error(tier: &'static str, op: &'static str) {
    counter!(names::CACHE_ERRORS_TOTAL, "tier" => tier, "op" => op).increment(1);
}

/// Record keys removed by a pattern invalidation.
pub fn record_invalidation(tier: &'static str, removed: u64) {
    counter!(names::CACHE_INVALIDATIONS_TOTAL, "tier" => tier).increment(removed);
}

/// Set the number of entries held by `tier`.
pub fn set_cache_entries(tier: &'static str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier).set(count as f64);
}
