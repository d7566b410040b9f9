//! Invalidation triggers.
//!
//! Each mutation declares the key patterns whose cached reads it can make stale.
//! The [`Invalidator`] clears them in a detached task so the mutation's HTTP
//! response never waits on the cache. Schedule only after the origin store has
//! committed the change; clearing earlier lets a concurrent reader repopulate
//! the cache with pre-mutation data.

use std::time::Instant;

use tokio::task::JoinHandle;

use crate::keys::{self, Namespace};
use crate::pattern::is_literal;
use crate::service::CacheService;

/// A committed change to origin data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ProductCreated,
    ProductUpdated { id: String },
    ProductDeleted { id: String },
    /// A review was added, moderated or removed.
    ReviewChanged { product_id: String },
    /// A user's wishlist gained or lost an item.
    WishlistChanged { user_id: String },
    /// Arbitrary key pattern.
    Pattern(String),
}

/// Namespaces whose entries aggregate over the whole catalog.
const CATALOG_WIDE: [Namespace; 10] = [
    Namespace::Products,
    Namespace::Search,
    Namespace::Analytics,
    Namespace::Trending,
    Namespace::Filter,
    Namespace::Stats,
    Namespace::Similar,
    Namespace::FrequentlyBought,
    Namespace::Recommendations,
    Namespace::Feed,
];

impl Mutation {
    /// Key patterns this mutation invalidates.
    ///
    /// Listings, search results, recommendations and wishlists embed whole
    /// products, so anything that rewrites a product (its fields, its rating
    /// or its existence) clears them as well.
    pub fn patterns(&self) -> Vec<String> {
        match self {
            Mutation::ProductCreated => catalog_wide(),
            Mutation::ProductUpdated { id } => {
                let mut patterns = vec![keys::product(id)];
                patterns.extend(catalog_wide());
                patterns.push(Namespace::Wishlist.wildcard());
                patterns
            }
            // Deletion cascades into reviews and wishlists
            Mutation::ProductDeleted { id } => {
                let mut patterns = vec![keys::product(id), product_reviews(id)];
                patterns.extend(catalog_wide());
                patterns.push(Namespace::Wishlist.wildcard());
                patterns
            }
            // Reviews rewrite the product's rating and review count
            Mutation::ReviewChanged { product_id } => {
                let mut patterns = vec![keys::product(product_id), product_reviews(product_id)];
                patterns.extend(catalog_wide());
                patterns.push(Namespace::Wishlist.wildcard());
                patterns
            }
            Mutation::WishlistChanged { user_id } => {
                let user = keys::escape_segment(user_id);
                vec![
                    keys::wishlist(user_id),
                    format!("{}:user:{user}:*", Namespace::Recommendations),
                    format!("{}:user:{user}:*", Namespace::Feed),
                    // Co-occurrence counts span every user's wishlist
                    Namespace::FrequentlyBought.wildcard(),
                ]
            }
            Mutation::Pattern(pattern) => vec![pattern.clone()],
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::ProductCreated => "product_created",
            Mutation::ProductUpdated { .. } => "product_updated",
            Mutation::ProductDeleted { .. } => "product_deleted",
            Mutation::ReviewChanged { .. } => "review_changed",
            Mutation::WishlistChanged { .. } => "wishlist_changed",
            Mutation::Pattern(_) => "pattern",
        }
    }
}

fn catalog_wide() -> Vec<String> {
    CATALOG_WIDE.iter().map(Namespace::wildcard).collect()
}

fn product_reviews(product_id: &str) -> String {
    format!(
        "{}:product:{}:*",
        Namespace::Reviews,
        keys::escape_segment(product_id)
    )
}

/// Summary of a finished invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub patterns: Vec<String>,
    /// Remote keys removed; `None` if any remote step was skipped or failed.
    pub remote_removed: Option<u64>,
    pub fallback_removed: usize,
}

/// Handle to a scheduled invalidation.
///
/// Dropping it detaches the task; awaiting [`InvalidationTicket::completed`]
/// waits for it deterministically.
#[derive(Debug)]
pub struct InvalidationTicket {
    handle: JoinHandle<InvalidationReport>,
}

impl InvalidationTicket {
    /// Wait for the invalidation to finish.
    ///
    /// A task that panicked or was cancelled yields `None` after logging.
    pub async fn completed(self) -> Option<InvalidationReport> {
        match self.handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "cache invalidation task failed");
                None
            }
        }
    }
}

/// Schedules invalidations against a [`CacheService`].
#[derive(Clone, Debug)]
pub struct Invalidator {
    cache: CacheService,
}

impl Invalidator {
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    /// Clear everything `mutation` invalidates in a background task.
    pub fn schedule(&self, mutation: Mutation) -> InvalidationTicket {
        self.schedule_patterns(mutation.kind(), mutation.patterns())
    }

    /// Clear an explicit set of patterns in a background task.
    pub fn schedule_patterns(&self, kind: &'static str, patterns: Vec<String>) -> InvalidationTicket {
        let cache = self.cache.clone();
        let handle = tokio::spawn(async move { run(cache, kind, patterns).await });
        InvalidationTicket { handle }
    }

    /// Clear everything `mutation` invalidates, inline.
    pub async fn invalidate_now(&self, mutation: Mutation) -> InvalidationReport {
        run(self.cache.clone(), mutation.kind(), mutation.patterns()).await
    }
}

async fn run(cache: CacheService, kind: &'static str, patterns: Vec<String>) -> InvalidationReport {
    let started = Instant::now();
    let mut remote_total = Some(0u64);
    let mut fallback_total = 0usize;

    for pattern in &patterns {
        if is_literal(pattern) {
            cache.delete(pattern).await;
            continue;
        }
        let outcome = cache.clear(pattern).await;
        remote_total = match (remote_total, outcome.remote_removed) {
            (Some(total), Some(n)) => Some(total + n),
            _ => None,
        };
        fallback_total += outcome.fallback_removed;
    }

    tracing::debug!(
        kind,
        patterns = patterns.len(),
        remote_removed = ?remote_total,
        fallback_removed = fallback_total,
        elapsed_us = started.elapsed().as_micros() as u64,
        "cache invalidated"
    );

    InvalidationReport {
        patterns,
        remote_removed: remote_total,
        fallback_removed: fallback_total,
    }
}
