//! Cache key builders.
//!
//! Every cached read endpoint derives its key here. Keys have the shape
//! `<namespace>:<param>:<param>:...` with parameters in a fixed positional order.
//! A parameter that is absent serializes to the empty string, so "no category
//! filter" and "category filter present" never produce the same key, and the
//! same function always emits the same segment count.
//!
//! Parameter text is escaped before it is embedded: `%`, `:`, and the glob
//! metacharacters `* ? [ ] \` are percent-encoded. A search query such as
//! `"usb:*"` therefore cannot add a segment or turn a key into a pattern that
//! a wildcard invalidation would treat specially.

use std::borrow::Cow;
use std::fmt::{self, Display, Write as _};

/// Key namespaces, one per cached feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Paginated product listings
    Products,
    /// Single product detail
    Product,
    /// Full-text and advanced search results
    Search,
    /// Aggregations over the catalog
    Analytics,
    /// Trending products (global and per category)
    Trending,
    /// Per-user recommendations
    Recommendations,
    /// "Similar products" lists
    Similar,
    /// "Frequently bought together" lists
    FrequentlyBought,
    /// Personalized feeds
    Feed,
    /// Product review pages
    Reviews,
    /// User wishlists
    Wishlist,
    /// Search filter options
    Filter,
    /// Catalog statistics
    Stats,
}

impl Namespace {
    /// Every namespace, in declaration order.
    pub const ALL: [Namespace; 13] = [
        Namespace::Products,
        Namespace::Product,
        Namespace::Search,
        Namespace::Analytics,
        Namespace::Trending,
        Namespace::Recommendations,
        Namespace::Similar,
        Namespace::FrequentlyBought,
        Namespace::Feed,
        Namespace::Reviews,
        Namespace::Wishlist,
        Namespace::Filter,
        Namespace::Stats,
    ];

    /// The leading key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Products => "products",
            Namespace::Product => "product",
            Namespace::Search => "search",
            Namespace::Analytics => "analytics",
            Namespace::Trending => "trending",
            Namespace::Recommendations => "recommendations",
            Namespace::Similar => "similar",
            Namespace::FrequentlyBought => "frequently-bought",
            Namespace::Feed => "feed",
            Namespace::Reviews => "reviews",
            Namespace::Wishlist => "wishlist",
            Namespace::Filter => "filter",
            Namespace::Stats => "stats",
        }
    }

    /// Pattern matching every key of this namespace, e.g. `products:*`.
    pub fn wildcard(&self) -> String {
        format!("{}:*", self.as_str())
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escapes a parameter so it can be embedded in a key as a single segment.
pub fn escape_segment(raw: &str) -> Cow<'_, str> {
    const SPECIAL: [char; 7] = ['%', ':', '*', '?', '[', ']', '\\'];
    if !raw.contains(SPECIAL) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        if SPECIAL.contains(&c) {
            let _ = write!(out, "%{:02X}", c as u32);
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Incremental positional key builder.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    key: String,
}

impl KeyBuilder {
    /// Starts a key in the given namespace.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            key: namespace.as_str().to_string(),
        }
    }

    /// Appends a fixed, trusted segment (not escaped).
    pub fn literal(mut self, segment: &str) -> Self {
        self.key.push(':');
        self.key.push_str(segment);
        self
    }

    /// Appends a parameter segment.
    pub fn param(mut self, value: impl Display) -> Self {
        self.key.push(':');
        let raw = value.to_string();
        self.key.push_str(&escape_segment(&raw));
        self
    }

    /// Appends an optional parameter; `None` becomes an empty segment.
    pub fn opt_param<T: Display>(self, value: Option<T>) -> Self {
        match value {
            Some(v) => self.param(v),
            None => self.param(""),
        }
    }

    /// Finishes the key.
    pub fn build(self) -> String {
        self.key
    }
}

/// Query parameters of the paginated product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductListQuery {
    pub page: u32,
    pub limit: u32,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: String,
    pub search: Option<String>,
}

impl Default for ProductListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 12,
            category: None,
            min_price: None,
            max_price: None,
            sort: "-createdAt".to_string(),
            search: None,
        }
    }
}

/// Query parameters of the advanced search endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedSearchQuery {
    pub query: Option<String>,
    /// Comma-separated category list, kept verbatim.
    pub categories: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort_by: String,
    pub page: u32,
    pub limit: u32,
}

impl Default for AdvancedSearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            categories: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            sort_by: "relevance".to_string(),
            page: 1,
            limit: 20,
        }
    }
}

/// `products:{page}:{limit}:{category}:{min_price}:{max_price}:{sort}:{search}`
pub fn product_list(q: &ProductListQuery) -> String {
    KeyBuilder::new(Namespace::Products)
        .param(q.page)
        .param(q.limit)
        .opt_param(q.category.as_deref())
        .opt_param(q.min_price)
        .opt_param(q.max_price)
        .param(&q.sort)
        .opt_param(q.search.as_deref())
        .build()
}

/// `product:{id}`
pub fn product(id: &str) -> String {
    KeyBuilder::new(Namespace::Product).param(id).build()
}

/// `analytics:categories`
pub fn category_analytics() -> String {
    KeyBuilder::new(Namespace::Analytics)
        .literal("categories")
        .build()
}

/// `search:{query}:{limit}`
pub fn search(query: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::Search)
        .param(query)
        .param(limit)
        .build()
}

/// `search:advanced:{q}:{categories}:{min_price}:{max_price}:{min_rating}:{sort_by}:{page}:{limit}`
pub fn advanced_search(q: &AdvancedSearchQuery) -> String {
    KeyBuilder::new(Namespace::Search)
        .literal("advanced")
        .opt_param(q.query.as_deref())
        .opt_param(q.categories.as_deref())
        .opt_param(q.min_price)
        .opt_param(q.max_price)
        .opt_param(q.min_rating)
        .param(&q.sort_by)
        .param(q.page)
        .param(q.limit)
        .build()
}

/// `trending:products:{limit}`
pub fn trending_products(limit: u32) -> String {
    KeyBuilder::new(Namespace::Trending)
        .literal("products")
        .param(limit)
        .build()
}

/// `trending:category:{category}:{limit}`
pub fn trending_category(category: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::Trending)
        .literal("category")
        .param(category)
        .param(limit)
        .build()
}

/// `recommendations:user:{user_id}:{limit}`
pub fn user_recommendations(user_id: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::Recommendations)
        .literal("user")
        .param(user_id)
        .param(limit)
        .build()
}

/// `similar:product:{product_id}:{limit}`
pub fn similar_products(product_id: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::Similar)
        .literal("product")
        .param(product_id)
        .param(limit)
        .build()
}

/// `frequently-bought:{product_id}:{limit}`
pub fn frequently_bought(product_id: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::FrequentlyBought)
        .param(product_id)
        .param(limit)
        .build()
}

/// `feed:user:{user_id}:{limit}`
pub fn user_feed(user_id: &str, limit: u32) -> String {
    KeyBuilder::new(Namespace::Feed)
        .literal("user")
        .param(user_id)
        .param(limit)
        .build()
}

/// `reviews:product:{product_id}:{page}:{limit}:{sort}`
pub fn product_reviews(product_id: &str, page: u32, limit: u32, sort: &str) -> String {
    KeyBuilder::new(Namespace::Reviews)
        .literal("product")
        .param(product_id)
        .param(page)
        .param(limit)
        .param(sort)
        .build()
}

/// `wishlist:{user_id}`
pub fn wishlist(user_id: &str) -> String {
    KeyBuilder::new(Namespace::Wishlist).param(user_id).build()
}

/// `filter:options`
pub fn filter_options() -> String {
    KeyBuilder::new(Namespace::Filter).literal("options").build()
}

/// `stats:products`
pub fn product_stats() -> String {
    KeyBuilder::new(Namespace::Stats).literal("products").build()
}

/// Whole-response key used by the HTTP response cache: `{METHOD}:{path_and_query}`.
///
/// The URL is kept verbatim; response keys live in their own method-named
/// namespace and are only ever invalidated by `GET:*...*` patterns.
pub fn response(method: &str, path_and_query: &str) -> String {
    format!("{method}:{path_and_query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_list_scenario_key() {
        let q = ProductListQuery {
            page: 1,
            limit: 12,
            category: Some("electronics".into()),
            min_price: Some(0.0),
            max_price: Some(100.0),
            sort: "-createdAt".into(),
            search: None,
        };
        assert_eq!(product_list(&q), "products:1:12:electronics:0:100:-createdAt:");
    }

    #[test]
    fn test_absent_parameters_keep_segment_count() {
        let key = product_list(&ProductListQuery::default());
        assert_eq!(key, "products:1:12:::::-createdAt:");
        assert_eq!(key.split(':').count(), 8);
    }

    #[test]
    fn test_absent_and_empty_are_distinguishable_from_present() {
        let absent = ProductListQuery::default();
        let present = ProductListQuery {
            category: Some("books".into()),
            ..ProductListQuery::default()
        };
        assert_ne!(product_list(&absent), product_list(&present));
    }

    #[test]
    fn test_deterministic() {
        let q = AdvancedSearchQuery {
            query: Some("laptop".into()),
            categories: Some("electronics,computers".into()),
            min_rating: Some(4.5),
            ..AdvancedSearchQuery::default()
        };
        assert_eq!(advanced_search(&q), advanced_search(&q.clone()));
        assert_eq!(
            advanced_search(&q),
            "search:advanced:laptop:electronics,computers:::4.5:relevance:1:20"
        );
    }

    #[test]
    fn test_separator_in_parameter_cannot_collide() {
        // Without escaping both would render as `search:a:b:20`.
        let a = search("a:b", 20);
        let b = KeyBuilder::new(Namespace::Search)
            .param("a")
            .param("b")
            .param(20)
            .build();
        assert_ne!(a, b);
        assert_eq!(a, "search:a%3Ab:20");
    }

    #[test]
    fn test_glob_characters_are_escaped() {
        assert_eq!(search("usb*", 10), "search:usb%2A:10");
        assert_eq!(product("[1]"), "product:%5B1%5D");
        assert_eq!(escape_segment("100%"), "100%25");
        assert!(matches!(escape_segment("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_feature_keys() {
        assert_eq!(product("abc"), "product:abc");
        assert_eq!(category_analytics(), "analytics:categories");
        assert_eq!(trending_products(10), "trending:products:10");
        assert_eq!(trending_category("toys", 5), "trending:category:toys:5");
        assert_eq!(user_recommendations("u1", 10), "recommendations:user:u1:10");
        assert_eq!(similar_products("p1", 6), "similar:product:p1:6");
        assert_eq!(frequently_bought("p1", 4), "frequently-bought:p1:4");
        assert_eq!(user_feed("u1", 20), "feed:user:u1:20");
        assert_eq!(
            product_reviews("p1", 2, 10, "-createdAt"),
            "reviews:product:p1:2:10:-createdAt"
        );
        assert_eq!(wishlist("u1"), "wishlist:u1");
        assert_eq!(filter_options(), "filter:options");
        assert_eq!(product_stats(), "stats:products");
        assert_eq!(
            response("GET", "/api/search/filters?x=1"),
            "GET:/api/search/filters?x=1"
        );
    }

    #[test]
    fn test_namespace_wildcards_do_not_overlap() {
        use crate::pattern::glob_match;

        for ns in Namespace::ALL {
            for other in Namespace::ALL {
                let key = KeyBuilder::new(other).param("1").build();
                assert_eq!(
                    glob_match(&ns.wildcard(), &key),
                    ns == other,
                    "{} vs {key}",
                    ns.wildcard()
                );
            }
        }
    }
}
