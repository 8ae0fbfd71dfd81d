/// Commerce platform data store abstraction
///
/// The recommender and checkout field customizer never talk to a database or
/// HTTP API directly. They go through `CommerceStore`, which has three
/// implementations: PostgreSQL, the WooCommerce REST API and an in-memory store.
use crate::{
    error::AppResult,
    models::{CatalogQuery, Category, CustomerId, Order, OrderId, OrderStatus, Product, ProductId},
};

pub mod memory;
pub mod postgres;
pub mod woocommerce;

pub use memory::InMemoryStore;
pub use postgres::PgCommerceStore;
pub use woocommerce::WooCommerceStore;

/// Trait for commerce platform stores
///
/// All operations are read-only except `save_order_meta`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CommerceStore: Send + Sync {
    /// Orders placed by `customer_id` whose status is one of `statuses`
    async fn find_orders(
        &self,
        customer_id: CustomerId,
        statuses: &[OrderStatus],
    ) -> AppResult<Vec<Order>>;

    /// Categories a product belongs to
    ///
    /// Returns an empty list for uncategorized products and `AppError::NotFound`
    /// when the product no longer exists.
    async fn categories_of(&self, product_id: ProductId) -> AppResult<Vec<Category>>;

    /// Catalog search filtered by category and exclusion list, capped at `query.limit`
    ///
    /// An empty category list matches nothing.
    async fn find_products(&self, query: &CatalogQuery) -> AppResult<Vec<Product>>;

    /// Single product lookup for display
    async fn find_product(&self, product_id: ProductId) -> AppResult<Option<Product>>;

    /// Writes (or overwrites) one meta entry on an order
    async fn save_order_meta(&self, order_id: OrderId, key: &str, value: &str) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
