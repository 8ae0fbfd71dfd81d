/// In-memory commerce store
///
/// Backs the test suite and the `memory` backend for local runs. The catalog
/// query returns products newest first (highest id first), which keeps results
/// deterministic.
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogQuery, Category, CustomerId, Order, OrderId, OrderStatus, Product, ProductId},
    services::commerce::CommerceStore,
};

#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<ProductId, Product>>,
    orders: RwLock<Vec<Order>>,
    order_meta: RwLock<HashMap<OrderId, HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    /// Removes a product from the catalog, leaving any orders that reference it intact
    pub async fn delete_product(&self, product_id: ProductId) -> Option<Product> {
        self.products.write().await.remove(&product_id)
    }

    pub async fn insert_order(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.retain(|existing| existing.id != order.id);
        orders.push(order);
    }

    /// Meta entries written to an order so far
    pub async fn order_meta(&self, order_id: OrderId) -> HashMap<String, String> {
        self.order_meta
            .read()
            .await
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CommerceStore for InMemoryStore {
    async fn find_orders(
        &self,
        customer_id: CustomerId,
        statuses: &[OrderStatus],
    ) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|order| order.customer_id == customer_id && statuses.contains(&order.status))
            .cloned()
            .collect())
    }

    async fn categories_of(&self, product_id: ProductId) -> AppResult<Vec<Category>> {
        let products = self.products.read().await;
        products
            .get(&product_id)
            .map(|product| product.categories.clone())
            .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))
    }

    async fn find_products(&self, query: &CatalogQuery) -> AppResult<Vec<Product>> {
        let products = self.products.read().await;

        let mut matches: Vec<&Product> = products
            .values()
            .filter(|product| !query.exclude_product_ids.contains(&product.id))
            .filter(|product| {
                product
                    .categories
                    .iter()
                    .any(|category| query.category_ids.contains(&category.id))
            })
            .collect();

        matches.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(matches
            .into_iter()
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn find_product(&self, product_id: ProductId) -> AppResult<Option<Product>> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }

    async fn save_order_meta(&self, order_id: OrderId, key: &str, value: &str) -> AppResult<()> {
        let known = self
            .orders
            .read()
            .await
            .iter()
            .any(|order| order.id == order_id);
        if !known {
            return Err(AppError::NotFound(format!("order {}", order_id)));
        }

        self.order_meta
            .write()
            .await
            .entry(order_id)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
