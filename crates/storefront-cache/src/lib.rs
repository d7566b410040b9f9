//! # storefront-cache
//!
//! Read-through cache with graceful degradation for the Storefront API.
//!
//! ## Architecture
//!
//! - **Remote tier ([`RedisStore`])**: shared across instances, native TTL
//! - **Fallback tier ([`FallbackCache`])**: in-process, bounded LRU, used when the
//!   remote tier is unreachable
//! - **Facade ([`CacheService`])**: the only surface consumers call
//!
//! ```text
//! handler ──► keys::product_list(..) ──► CacheService::get ──► hit ──► respond
//!                                              │
//!                                              └─ miss ──► origin query ──► CacheService::set
//!
//! mutation ──► origin commit ──► Invalidator::schedule(Mutation) ──► CacheService::clear(pattern)
//! ```
//!
//! ## Failure policy
//!
//! Cache errors never reach callers. Reads degrade to misses (or to the
//! fallback tier when the remote store is down), writes and deletes degrade to
//! no-ops. The origin store stays the source of truth.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use storefront_cache::{CacheService, MemoryStore, keys};
//!
//! # tokio_test::block_on(async {
//! let cache = CacheService::builder()
//!     .with_remote(Arc::new(MemoryStore::new()))
//!     .build();
//!
//! let key = keys::product("42");
//! cache.set(&key, &serde_json::json!({"name": "Lamp"}), 7200).await;
//! let hit: Option<serde_json::Value> = cache.get(&key).await;
//! assert_eq!(hit.unwrap()["name"], "Lamp");
//! # });
//! ```

mod error;
pub mod fallback;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod pattern;
pub mod remote;
mod service;
pub mod telemetry;

pub use error::{CacheError, CacheResult};
pub use fallback::{FallbackCache, FallbackStats, MAX_TTL_SECS};
pub use invalidation::{InvalidationReport, InvalidationTicket, Invalidator, Mutation};
pub use memory::MemoryStore;
pub use remote::{ConnectionState, ReconnectPolicy, RedisSettings, RedisStore, RemoteStore};
pub use service::{
    CacheMode, CacheService, CacheServiceBuilder, CacheStats, ClearOutcome, DEFAULT_TTL_SECS,
    Lookup,
};
