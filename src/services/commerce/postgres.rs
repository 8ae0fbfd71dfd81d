/// PostgreSQL commerce store
///
/// Reads the schema created by `migrations/`. Line items are stored with a
/// position so orders keep their original item sequence.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::{
    error::{AppError, AppResult},
    models::{
        CatalogQuery, Category, CategoryId, CustomerId, LineItem, Order, OrderId, OrderStatus,
        Product, ProductId,
    },
    services::commerce::CommerceStore,
};

#[derive(Clone)]
pub struct PgCommerceStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: i64,
    product_id: i64,
    quantity: i32,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    image_url: Option<String>,
    price: i64,
    permalink: String,
}

#[derive(Debug, FromRow)]
struct ProductCategoryRow {
    product_id: i64,
    id: i64,
    slug: String,
    name: String,
}

impl PgCommerceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads category memberships for a batch of products
    async fn load_categories(
        &self,
        product_ids: &[i64],
    ) -> AppResult<HashMap<ProductId, Vec<Category>>> {
        let rows: Vec<ProductCategoryRow> = sqlx::query_as(
            r#"
            SELECT pc.product_id, c.id, c.slug, c.name
            FROM product_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.product_id = ANY($1)
            ORDER BY pc.product_id, c.id
            "#,
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<ProductId, Vec<Category>> = HashMap::new();
        for row in rows {
            categories
                .entry(ProductId(row.product_id))
                .or_default()
                .push(Category {
                    id: CategoryId(row.id),
                    slug: row.slug,
                    name: row.name,
                });
        }

        Ok(categories)
    }
}

/// Stored status values matching `statuses`, in both bare and `wc-` prefixed form
fn status_filter(statuses: &[OrderStatus]) -> Vec<String> {
    statuses
        .iter()
        .flat_map(|status| [status.as_str().to_string(), format!("wc-{}", status.as_str())])
        .collect()
}

/// Attaches line items to their orders, keeping both input orderings
fn assemble_orders(rows: Vec<OrderRow>, items: Vec<OrderItemRow>) -> Vec<Order> {
    let mut items_by_order: HashMap<i64, Vec<LineItem>> = HashMap::new();
    for item in items {
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(LineItem {
                product_id: ProductId(item.product_id),
                quantity: item.quantity.max(0) as u32,
            });
    }

    rows.into_iter()
        .map(|row| Order {
            id: OrderId(row.id),
            customer_id: CustomerId(row.customer_id),
            status: row.status.parse().unwrap_or(OrderStatus::Other),
            items: items_by_order.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
        })
        .collect()
}

#[async_trait::async_trait]
impl CommerceStore for PgCommerceStore {
    async fn find_orders(
        &self,
        customer_id: CustomerId,
        statuses: &[OrderStatus],
    ) -> AppResult<Vec<Order>> {
        let statuses = status_filter(statuses);

        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, status, created_at
            FROM orders
            WHERE customer_id = $1 AND status = ANY($2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(customer_id.0)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let items: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT order_id, product_id, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            customer_id = %customer_id,
            order_count = rows.len(),
            item_count = items.len(),
            "Loaded orders from database"
        );

        Ok(assemble_orders(rows, items))
    }

    async fn categories_of(&self, product_id: ProductId) -> AppResult<Vec<Category>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(product_id.0)
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Err(AppError::NotFound(format!("product {}", product_id)));
        }

        let mut categories = self.load_categories(&[product_id.0]).await?;
        Ok(categories.remove(&product_id).unwrap_or_default())
    }

    async fn find_products(&self, query: &CatalogQuery) -> AppResult<Vec<Product>> {
        if query.category_ids.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let category_ids: Vec<i64> = query.category_ids.iter().map(|id| id.0).collect();
        let exclude_ids: Vec<i64> = query.exclude_product_ids.iter().map(|id| id.0).collect();

        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.name, p.image_url, p.price, p.permalink
            FROM products p
            WHERE p.status = 'publish'
              AND EXISTS (
                  SELECT 1 FROM product_categories pc
                  WHERE pc.product_id = p.id AND pc.category_id = ANY($1)
              )
              AND NOT (p.id = ANY($2))
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $3
            "#,
        )
        .bind(&category_ids)
        .bind(&exclude_ids)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let product_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut categories = self.load_categories(&product_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| Product {
                id: ProductId(row.id),
                categories: categories.remove(&ProductId(row.id)).unwrap_or_default(),
                name: row.name,
                image: row.image_url,
                price: row.price,
                permalink: row.permalink,
            })
            .collect())
    }

    async fn find_product(&self, product_id: ProductId) -> AppResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, name, image_url, price, permalink
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut categories = self.load_categories(&[row.id]).await?;
        Ok(Some(Product {
            id: product_id,
            categories: categories.remove(&product_id).unwrap_or_default(),
            name: row.name,
            image: row.image_url,
            price: row.price,
            permalink: row.permalink,
        }))
    }

    async fn save_order_meta(&self, order_id: OrderId, key: &str, value: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_meta (order_id, meta_key, meta_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id, meta_key) DO UPDATE SET meta_value = EXCLUDED.meta_value
            "#,
        )
        .bind(order_id.0)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(AppError::NotFound(format!("order {}", order_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
