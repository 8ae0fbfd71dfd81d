use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogQuery, Category, CategoryId, CustomerId, OrderStatus, Product, ProductId},
    services::commerce::CommerceStore,
};

/// Tunables for the affinity recommender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommenderSettings {
    /// Maximum number of products returned
    pub max_results: usize,
    /// Number of highest-affinity categories searched for candidates
    pub top_categories: usize,
}

impl Default for RecommenderSettings {
    fn default() -> Self {
        Self {
            max_results: 4,
            top_categories: 3,
        }
    }
}

/// Category occurrence counts across a shopper's purchases
///
/// Keeps first-encounter order so equal counts rank deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffinityCounts {
    counts: Vec<(CategoryId, u32)>,
    index: HashMap<CategoryId, usize>,
}

impl AffinityCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category_id: CategoryId) {
        match self.index.get(&category_id) {
            Some(&position) => self.counts[position].1 += 1,
            None => {
                self.index.insert(category_id, self.counts.len());
                self.counts.push((category_id, 1));
            }
        }
    }

    pub fn count(&self, category_id: CategoryId) -> u32 {
        self.index
            .get(&category_id)
            .map(|&position| self.counts[position].1)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `n` most frequent categories, highest count first
    pub fn top(&self, n: usize) -> Vec<CategoryId> {
        let mut ranked = self.counts.clone();
        // stable: ties keep encounter order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().take(n).map(|(id, _)| id).collect()
    }
}

/// What a shopper has bought, as far as recommendations are concerned
#[derive(Debug, Clone, Default)]
pub struct PurchaseHistory {
    /// Distinct purchased products in first-seen order
    pub purchased: Vec<ProductId>,
    pub affinity: AffinityCounts,
    pub order_count: usize,
}

impl PurchaseHistory {
    fn record_purchase(&mut self, product_id: ProductId, seen: &mut HashSet<ProductId>) {
        if seen.insert(product_id) {
            self.purchased.push(product_id);
        }
    }
}

/// Recommends products from the categories a shopper buys from most
///
/// Counts how often each category appears across the shopper's completed and
/// processing orders, then asks the catalog for products in the top categories
/// that the shopper has not bought yet. Everything is recomputed per call.
#[derive(Clone)]
pub struct AffinityRecommender {
    store: Arc<dyn CommerceStore>,
    settings: RecommenderSettings,
}

impl AffinityRecommender {
    pub fn new(store: Arc<dyn CommerceStore>, settings: RecommenderSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> RecommenderSettings {
        self.settings
    }

    /// Builds the purchased set and category affinity for a shopper
    ///
    /// Line items whose product no longer exists still count as purchased but
    /// add no categories.
    pub async fn purchase_history(&self, customer_id: CustomerId) -> AppResult<PurchaseHistory> {
        let orders = self
            .store
            .find_orders(customer_id, &OrderStatus::QUALIFYING)
            .await?;

        let mut history = PurchaseHistory::default();
        let mut seen = HashSet::new();
        let mut categories_by_product: HashMap<ProductId, Vec<Category>> = HashMap::new();

        for order in &orders {
            // the store filters by status, but history must never include other statuses
            if !order.status.counts_toward_history() {
                continue;
            }
            history.order_count += 1;

            for item in &order.items {
                history.record_purchase(item.product_id, &mut seen);

                if !categories_by_product.contains_key(&item.product_id) {
                    let categories = match self.store.categories_of(item.product_id).await {
                        Ok(categories) => categories,
                        Err(AppError::NotFound(_)) => {
                            tracing::debug!(
                                customer_id = %customer_id,
                                order_id = %order.id,
                                product_id = %item.product_id,
                                "Skipping line item for missing product"
                            );
                            Vec::new()
                        }
                        Err(e) => return Err(e),
                    };
                    categories_by_product.insert(item.product_id, categories);
                }

                if let Some(categories) = categories_by_product.get(&item.product_id) {
                    for category in categories {
                        history.affinity.record(category.id);
                    }
                }
            }
        }

        Ok(history)
    }

    /// Product ids to recommend to a shopper, at most `max_results`
    ///
    /// Returns an empty list without querying the catalog when the shopper has
    /// no categorized purchase history.
    pub async fn recommend(&self, customer_id: CustomerId) -> AppResult<Vec<ProductId>> {
        let start = Instant::now();
        let history = self.purchase_history(customer_id).await?;

        let top_categories = history.affinity.top(self.settings.top_categories);
        if top_categories.is_empty() {
            tracing::debug!(
                customer_id = %customer_id,
                order_count = history.order_count,
                "No category affinity, nothing to recommend"
            );
            return Ok(Vec::new());
        }

        let query = CatalogQuery {
            category_ids: top_categories,
            exclude_product_ids: history.purchased.clone(),
            limit: self.settings.max_results,
        };
        let candidates = self.store.find_products(&query).await?;

        let purchased: HashSet<ProductId> = history.purchased.iter().copied().collect();
        let candidate_count = candidates.len();
        let recommended: Vec<ProductId> = candidates
            .into_iter()
            .map(|product| product.id)
            .filter(|id| !purchased.contains(id))
            .take(self.settings.max_results)
            .collect();

        if recommended.len() < candidate_count {
            tracing::warn!(
                customer_id = %customer_id,
                returned = candidate_count,
                kept = recommended.len(),
                store = self.store.name(),
                "Catalog returned excluded or surplus products"
            );
        }

        tracing::info!(
            customer_id = %customer_id,
            order_count = history.order_count,
            category_count = history.affinity.len(),
            top_categories = ?query.category_ids,
            result_count = recommended.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Recommendations computed"
        );

        Ok(recommended)
    }

    /// Recommended products resolved to display data, in recommendation order
    ///
    /// Products that disappear between the catalog query and the lookup are dropped.
    pub async fn recommend_products(&self, customer_id: CustomerId) -> AppResult<Vec<Product>> {
        let ids = self.recommend(customer_id).await?;

        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.find_product(id).await? {
                Some(product) => products.push(product),
                None => tracing::debug!(product_id = %id, "Recommended product vanished"),
            }
        }

        Ok(products)
    }
}
