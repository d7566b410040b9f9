//! In-process origin store.
//!
//! Stands in for the document database behind the API. Every read counts as
//! one origin query, which is how tests observe whether a response came from
//! the cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use storefront_cache::keys::{AdvancedSearchQuery, ProductListQuery};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews_count: u32,
    pub in_stock: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unix milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category: String,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub in_stock: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub user_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_products: usize,
    pub total_pages: usize,
}

impl Pagination {
    fn new(page: u32, limit: u32, total: usize) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as usize)
        };
        Self {
            page,
            limit,
            total_products: total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub query: Option<String>,
    pub categories: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub sort_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub products: Vec<Product>,
    pub pagination: Pagination,
    pub filters: AppliedFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub total_in_stock: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    pub pagination: Pagination,
    pub average_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub categories: Vec<String>,
    pub price_range: PriceRange,
    /// Product count per whole-star rating.
    pub rating_distribution: BTreeMap<u8, usize>,
    pub sort_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub total_products: usize,
    pub in_stock_count: usize,
    pub out_of_stock_count: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_rating: f64,
}

/// Advanced search sort orders.
pub const SORT_OPTIONS: [&str; 6] = [
    "relevance",
    "newest",
    "price-asc",
    "price-desc",
    "rating",
    "popularity",
];

/// Origin store for products, reviews and wishlists.
#[derive(Debug, Default)]
pub struct Catalog {
    products: RwLock<HashMap<String, Product>>,
    reviews: RwLock<Vec<Review>>,
    wishlists: DashMap<String, Vec<String>>,
    queries: AtomicU64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with a small demo assortment.
    pub fn seeded() -> Self {
        let catalog = Self::new();
        let base = now_millis() - 86_400_000;
        let items: [(&str, &str, f64, bool, &[&str]); 8] = [
            ("Desk Lamp", "lighting", 29.0, true, &["desk", "led"]),
            ("Floor Lamp", "lighting", 79.0, true, &["floor", "led"]),
            ("Noise Cancelling Headphones", "electronics", 99.0, true, &["audio"]),
            ("Wireless Earbuds", "electronics", 59.0, true, &["audio", "wireless"]),
            ("Mechanical Keyboard", "electronics", 89.0, false, &["keyboard"]),
            ("Standing Desk", "furniture", 349.0, true, &["desk", "office"]),
            ("Office Chair", "furniture", 199.0, true, &["office", "chair"]),
            ("Rust in Action", "books", 39.0, true, &["programming"]),
        ];
        {
            let mut products = catalog.products.write();
            for (i, (name, category, price, in_stock, tags)) in items.iter().enumerate() {
                let id = (i + 1).to_string();
                products.insert(
                    id.clone(),
                    Product {
                        id,
                        name: name.to_string(),
                        description: format!("{name} for everyday use"),
                        price: *price,
                        category: category.to_string(),
                        rating: 0.0,
                        reviews_count: 0,
                        in_stock: *in_stock,
                        tags: tags.iter().map(|t| t.to_string()).collect(),
                        created_at: base + i as i64 * 60_000,
                    },
                );
            }
        }
        catalog
    }

    /// Number of origin reads served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn count_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    // ---- Products ----

    pub fn list_products(&self, q: &ProductListQuery) -> ProductPage {
        self.count_query();
        let products = self.products.read();
        let mut matching: Vec<Product> = products
            .values()
            .filter(|p| q.category.as_deref().is_none_or(|c| p.category == c))
            .filter(|p| q.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| q.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| q.search.as_deref().is_none_or(|s| text_score(p, s) > 0))
            .cloned()
            .collect();
        sort_by_field(&mut matching, &q.sort);
        let pagination = Pagination::new(q.page, q.limit, matching.len());
        ProductPage {
            products: paginate(matching, q.page, q.limit),
            pagination,
        }
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.count_query();
        self.products.read().get(id).cloned()
    }

    pub fn category_analytics(&self) -> Vec<CategorySummary> {
        self.count_query();
        let products = self.products.read();
        let mut groups: BTreeMap<&str, Vec<&Product>> = BTreeMap::new();
        for p in products.values() {
            groups.entry(p.category.as_str()).or_default().push(p);
        }
        let mut summaries: Vec<CategorySummary> = groups
            .into_iter()
            .map(|(category, items)| {
                let prices = items.iter().map(|p| p.price);
                CategorySummary {
                    category: category.to_string(),
                    count: items.len(),
                    avg_price: mean(prices.clone()),
                    min_price: prices.clone().fold(f64::INFINITY, f64::min),
                    max_price: prices.fold(f64::NEG_INFINITY, f64::max),
                    total_in_stock: items.iter().filter(|p| p.in_stock).count(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));
        summaries
    }

    /// Full-text style search over name, description, category and tags.
    pub fn search(&self, query: &str, limit: u32) -> Vec<Product> {
        self.count_query();
        let products = self.products.read();
        let mut scored: Vec<(usize, Product)> = products
            .values()
            .map(|p| (text_score(p, query), p))
            .filter(|(score, _)| *score > 0)
            .map(|(score, p)| (score, p.clone()))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored
            .into_iter()
            .take(limit as usize)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn advanced_search(&self, q: &AdvancedSearchQuery) -> SearchPage {
        self.count_query();
        let categories: Vec<String> = q
            .categories
            .as_deref()
            .map(|c| {
                c.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let query = q.query.as_deref().filter(|s| s.len() > 1);

        let products = self.products.read();
        let mut scored: Vec<(usize, Product)> = products
            .values()
            .filter(|p| categories.is_empty() || categories.contains(&p.category))
            .filter(|p| q.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| q.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| q.min_rating.is_none_or(|min| p.rating >= min))
            .map(|p| (query.map_or(1, |s| text_score(p, s)), p.clone()))
            .filter(|(score, _)| *score > 0)
            .collect();

        match q.sort_by.as_str() {
            "price-asc" => scored.sort_by(|a, b| a.1.price.total_cmp(&b.1.price)),
            "price-desc" => scored.sort_by(|a, b| b.1.price.total_cmp(&a.1.price)),
            "rating" => scored.sort_by(|a, b| b.1.rating.total_cmp(&a.1.rating)),
            "popularity" => scored.sort_by(|a, b| b.1.reviews_count.cmp(&a.1.reviews_count)),
            "newest" => scored.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at)),
            _ if query.is_some() => scored.sort_by(|a, b| b.0.cmp(&a.0)),
            _ => scored.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at)),
        }

        let matching: Vec<Product> = scored.into_iter().map(|(_, p)| p).collect();
        let pagination = Pagination::new(q.page, q.limit, matching.len());
        SearchPage {
            products: paginate(matching, q.page, q.limit),
            pagination,
            filters: AppliedFilters {
                query: q.query.clone(),
                categories,
                min_price: q.min_price,
                max_price: q.max_price,
                min_rating: q.min_rating,
                sort_by: q.sort_by.clone(),
            },
        }
    }

    /// In-stock products ranked by review count, then rating.
    pub fn trending(&self, category: Option<&str>, limit: u32) -> Vec<Product> {
        self.count_query();
        let products = self.products.read();
        let mut items: Vec<Product> = products
            .values()
            .filter(|p| p.in_stock)
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect();
        items.sort_by(popularity);
        items.truncate(limit as usize);
        items
    }

    /// Same-category, in-stock products priced within ±50% of `id`.
    pub fn similar(&self, id: &str, limit: u32) -> Option<Vec<Product>> {
        self.count_query();
        let products = self.products.read();
        let base = products.get(id)?;
        let (low, high) = (base.price * 0.5, base.price * 1.5);
        let mut items: Vec<Product> = products
            .values()
            .filter(|p| p.id != base.id && p.in_stock && p.category == base.category)
            .filter(|p| p.price >= low && p.price <= high)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(popularity(a, b)));
        items.truncate(limit as usize);
        Some(items)
    }

    /// Products from the categories of the user's wishlist, excluding items
    /// already on it. Users with an empty wishlist get trending products.
    pub fn recommendations(&self, user_id: &str, limit: u32) -> Vec<Product> {
        let saved: Vec<String> = self
            .wishlists
            .get(user_id)
            .map(|w| w.value().clone())
            .unwrap_or_default();
        if saved.is_empty() {
            return self.trending(None, limit);
        }

        self.count_query();
        let products = self.products.read();
        let categories: BTreeSet<&str> = saved
            .iter()
            .filter_map(|id| products.get(id))
            .map(|p| p.category.as_str())
            .collect();
        let mut items: Vec<Product> = products
            .values()
            .filter(|p| p.in_stock && !saved.contains(&p.id))
            .filter(|p| categories.contains(p.category.as_str()))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(popularity(a, b)));
        items.truncate(limit as usize);
        items
    }

    /// In-stock products most often saved alongside `id`, counting each
    /// wishlist that holds `id` as one basket. `None` if `id` does not exist.
    pub fn frequently_bought(&self, id: &str, limit: u32) -> Option<Vec<Product>> {
        self.count_query();
        let products = self.products.read();
        if !products.contains_key(id) {
            return None;
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for basket in self.wishlists.iter().filter(|w| w.iter().any(|p| p == id)) {
            for other in basket.iter().filter(|p| p.as_str() != id) {
                *counts.entry(other.clone()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(usize, Product)> = counts
            .into_iter()
            .filter_map(|(pid, n)| products.get(&pid).map(|p| (n, p.clone())))
            .filter(|(_, p)| p.in_stock)
            .collect();
        ranked.sort_by(|(na, a), (nb, b)| nb.cmp(na).then(popularity(a, b)));
        Some(
            ranked
                .into_iter()
                .take(limit as usize)
                .map(|(_, p)| p)
                .collect(),
        )
    }

    /// Newest in-stock products.
    pub fn new_arrivals(&self, limit: u32) -> Vec<Product> {
        self.count_query();
        let products = self.products.read();
        let mut items: Vec<Product> = products.values().filter(|p| p.in_stock).cloned().collect();
        sort_by_field(&mut items, "-createdAt");
        items.truncate(limit as usize);
        items
    }

    pub fn filter_options(&self) -> FilterOptions {
        self.count_query();
        let products = self.products.read();
        let categories: BTreeSet<String> = products.values().map(|p| p.category.clone()).collect();
        let mut rating_distribution = BTreeMap::new();
        for p in products.values() {
            *rating_distribution.entry(p.rating.floor() as u8).or_insert(0) += 1;
        }
        let prices = products.values().map(|p| p.price);
        FilterOptions {
            categories: categories.into_iter().collect(),
            price_range: PriceRange {
                min_price: finite_or_zero(prices.clone().fold(f64::INFINITY, f64::min)),
                max_price: finite_or_zero(prices.fold(f64::NEG_INFINITY, f64::max)),
            },
            rating_distribution,
            sort_options: SORT_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn product_stats(&self) -> ProductStats {
        self.count_query();
        let products = self.products.read();
        let in_stock = products.values().filter(|p| p.in_stock).count();
        let prices = products.values().map(|p| p.price);
        ProductStats {
            total_products: products.len(),
            in_stock_count: in_stock,
            out_of_stock_count: products.len() - in_stock,
            avg_price: mean(prices.clone()),
            min_price: finite_or_zero(prices.clone().fold(f64::INFINITY, f64::min)),
            max_price: finite_or_zero(prices.fold(f64::NEG_INFINITY, f64::max)),
            avg_rating: mean(products.values().map(|p| p.rating)),
        }
    }

    pub fn create_product(&self, new: NewProduct) -> Product {
        let product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            price: new.price,
            category: new.category,
            rating: 0.0,
            reviews_count: 0,
            in_stock: new.in_stock,
            tags: new.tags,
            created_at: now_millis(),
        };
        self.products
            .write()
            .insert(product.id.clone(), product.clone());
        product
    }

    pub fn update_product(&self, id: &str, patch: ProductPatch) -> Option<Product> {
        let mut products = self.products.write();
        let product = products.get_mut(id)?;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(category) = patch.category {
            product.category = category;
        }
        if let Some(in_stock) = patch.in_stock {
            product.in_stock = in_stock;
        }
        if let Some(tags) = patch.tags {
            product.tags = tags;
        }
        Some(product.clone())
    }

    /// Remove a product with its reviews and wishlist references.
    pub fn delete_product(&self, id: &str) -> bool {
        if self.products.write().remove(id).is_none() {
            return false;
        }
        self.reviews.write().retain(|r| r.product_id != id);
        for mut entry in self.wishlists.iter_mut() {
            entry.value_mut().retain(|p| p != id);
        }
        true
    }

    // ---- Reviews ----

    pub fn reviews_for(
        &self,
        product_id: &str,
        page: u32,
        limit: u32,
        sort: &str,
    ) -> Option<ReviewPage> {
        self.count_query();
        if !self.products.read().contains_key(product_id) {
            return None;
        }
        let mut reviews: Vec<Review> = self
            .reviews
            .read()
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        let average_rating = mean(reviews.iter().map(|r| f64::from(r.rating)));
        match sort {
            "createdAt" => reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            "rating" => reviews.sort_by(|a, b| a.rating.cmp(&b.rating)),
            "-rating" => reviews.sort_by(|a, b| b.rating.cmp(&a.rating)),
            _ => reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        let pagination = Pagination::new(page, limit, reviews.len());
        Some(ReviewPage {
            reviews: paginate(reviews, page, limit),
            pagination,
            average_rating,
        })
    }

    /// Add a review and refresh the product's rating. `None` if the product
    /// does not exist.
    pub fn add_review(&self, product_id: &str, new: NewReview) -> Option<Review> {
        if !self.products.read().contains_key(product_id) {
            return None;
        }
        let review = Review {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            user_id: new.user_id,
            rating: new.rating,
            comment: new.comment,
            created_at: now_millis(),
        };
        self.reviews.write().push(review.clone());
        self.refresh_rating(product_id);
        Some(review)
    }

    pub fn delete_review(&self, review_id: &str) -> Option<Review> {
        let removed = {
            let mut reviews = self.reviews.write();
            let index = reviews.iter().position(|r| r.id == review_id)?;
            reviews.remove(index)
        };
        self.refresh_rating(&removed.product_id);
        Some(removed)
    }

    fn refresh_rating(&self, product_id: &str) {
        let (count, avg) = {
            let reviews = self.reviews.read();
            let ratings: Vec<f64> = reviews
                .iter()
                .filter(|r| r.product_id == product_id)
                .map(|r| f64::from(r.rating))
                .collect();
            (ratings.len(), mean(ratings.into_iter()))
        };
        if let Some(product) = self.products.write().get_mut(product_id) {
            product.reviews_count = count as u32;
            product.rating = (avg * 10.0).round() / 10.0;
        }
    }

    // ---- Wishlists ----

    pub fn wishlist(&self, user_id: &str) -> Vec<Product> {
        self.count_query();
        let ids = self
            .wishlists
            .get(user_id)
            .map(|w| w.value().clone())
            .unwrap_or_default();
        let products = self.products.read();
        ids.iter().filter_map(|id| products.get(id).cloned()).collect()
    }

    /// Add a product to a wishlist. `None` if the product does not exist,
    /// `Some(false)` if it was already saved.
    pub fn add_to_wishlist(&self, user_id: &str, product_id: &str) -> Option<bool> {
        if !self.products.read().contains_key(product_id) {
            return None;
        }
        let mut entry = self.wishlists.entry(user_id.to_string()).or_default();
        if entry.iter().any(|p| p == product_id) {
            return Some(false);
        }
        entry.push(product_id.to_string());
        Some(true)
    }

    /// Remove a product from a wishlist, returning whether it was saved.
    pub fn remove_from_wishlist(&self, user_id: &str, product_id: &str) -> bool {
        match self.wishlists.get_mut(user_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|p| p != product_id);
                entry.len() != before
            }
            None => false,
        }
    }
}

fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn popularity(a: &Product, b: &Product) -> std::cmp::Ordering {
    b.reviews_count
        .cmp(&a.reviews_count)
        .then(b.rating.total_cmp(&a.rating))
        .then_with(|| a.id.cmp(&b.id))
}

/// Number of query terms found in the product's searchable text.
fn text_score(product: &Product, query: &str) -> usize {
    let haystack = format!(
        "{} {} {} {}",
        product.name,
        product.description,
        product.category,
        product.tags.join(" ")
    )
    .to_lowercase();
    query
        .split_whitespace()
        .filter(|term| haystack.contains(&term.to_lowercase()))
        .count()
}

/// Sort by `field` ascending or `-field` descending; unknown fields sort by creation time.
fn sort_by_field(items: &mut [Product], order: &str) {
    let (descending, field) = match order.strip_prefix('-') {
        Some(field) => (true, field),
        None => (false, order),
    };
    items.sort_by(|a, b| {
        let ord = match field {
            "price" => a.price.total_cmp(&b.price),
            "rating" => a.rating.total_cmp(&b.rating),
            "name" => a.name.cmp(&b.name),
            "reviewsCount" => a.reviews_count.cmp(&b.reviews_count),
            _ => a.created_at.cmp(&b.created_at),
        };
        let ord = if descending { ord.reverse() } else { ord };
        ord.then_with(|| a.id.cmp(&b.id))
    });
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let skip = (page.max(1) as usize - 1).saturating_mul(limit as usize);
    items.into_iter().skip(skip).take(limit as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filters_and_paginates() {
        let catalog = Catalog::seeded();
        let page = catalog.list_products(&ProductListQuery {
            category: Some("electronics".into()),
            max_price: Some(95.0),
            limit: 1,
            ..ProductListQuery::default()
        });
        assert_eq!(page.pagination.total_products, 2);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.products.len(), 1);
        // Newest first
        assert_eq!(page.products[0].name, "Mechanical Keyboard");
        assert_eq!(catalog.query_count(), 1);
    }

    #[test]
    fn test_frequently_bought_counts_shared_wishlists() {
        let catalog = Catalog::seeded();
        catalog.add_to_wishlist("a", "1");
        catalog.add_to_wishlist("a", "2");
        catalog.add_to_wishlist("a", "5");
        catalog.add_to_wishlist("b", "1");
        catalog.add_to_wishlist("b", "2");
        catalog.add_to_wishlist("b", "3");
        catalog.add_to_wishlist("c", "3");
        catalog.add_to_wishlist("c", "4");

        let ids: Vec<String> = catalog
            .frequently_bought("1", 5)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        // "5" is out of stock, "4" never shares a wishlist with "1"
        assert_eq!(ids, vec!["2".to_string(), "3".to_string()]);
        assert_eq!(catalog.frequently_bought("1", 1).unwrap().len(), 1);
        assert!(catalog.frequently_bought("8", 5).unwrap().is_empty());
        assert!(catalog.frequently_bought("missing", 5).is_none());
    }

    #[test]
    fn test_search_ranks_by_matching_terms() {
        let catalog = Catalog::seeded();
        let results = catalog.search("desk lamp", 10);
        assert_eq!(results[0].name, "Desk Lamp");
        assert!(results.iter().any(|p| p.name == "Standing Desk"));
        assert!(catalog.search("zzz", 10).is_empty());
    }

    #[test]
    fn test_reviews_update_product_rating() {
        let catalog = Catalog::seeded();
        for rating in [4, 5] {
            catalog.add_review(
                "1",
                NewReview {
                    user_id: "u".into(),
                    rating,
                    comment: String::new(),
                },
            );
        }
        let product = catalog.product("1").unwrap();
        assert_eq!(product.reviews_count, 2);
        assert_eq!(product.rating, 4.5);

        let page = catalog.reviews_for("1", 1, 10, "-rating").unwrap();
        assert_eq!(page.reviews[0].rating, 5);
        assert_eq!(page.average_rating, 4.5);

        catalog.delete_review(&page.reviews[0].id).unwrap();
        assert_eq!(catalog.product("1").unwrap().rating, 4.0);

        let orphan = NewReview {
            user_id: "u".into(),
            rating: 1,
            comment: String::new(),
        };
        assert!(catalog.add_review("404", orphan).is_none());
    }

    #[test]
    fn test_wishlist_drives_recommendations() {
        let catalog = Catalog::seeded();
        assert_eq!(catalog.add_to_wishlist("alice", "3"), Some(true));
        assert_eq!(catalog.add_to_wishlist("alice", "3"), Some(false));
        assert_eq!(catalog.add_to_wishlist("alice", "404"), None);

        let recs = catalog.recommendations("alice", 10);
        assert!(recs.iter().all(|p| p.category == "electronics" && p.id != "3"));
        assert!(!recs.is_empty());

        assert!(catalog.remove_from_wishlist("alice", "3"));
        assert!(catalog.wishlist("alice").is_empty());
    }

    #[test]
    fn test_similar_respects_price_band() {
        let catalog = Catalog::seeded();
        let similar = catalog.similar("1", 10).unwrap();
        // 29 * 1.5 = 43.5 excludes the floor lamp
        assert!(similar.is_empty());
        assert!(catalog.similar("404", 10).is_none());
    }

    #[test]
    fn test_delete_product_cascades() {
        let catalog = Catalog::seeded();
        catalog.add_to_wishlist("bob", "2");
        assert!(catalog.delete_product("2"));
        assert!(!catalog.delete_product("2"));
        assert!(catalog.wishlist("bob").is_empty());
    }
}
