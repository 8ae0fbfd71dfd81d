// ============================================================================
// WooCommerce REST API (wc/v3) Types
// ============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Category, CategoryId, CustomerId, LineItem, Order, OrderId, OrderStatus, Product, ProductId,
};

/// Order resource from GET /orders
#[derive(Debug, Clone, Deserialize)]
pub struct WcOrder {
    pub id: i64,
    #[serde(default)]
    pub customer_id: i64,
    pub status: String,
    #[serde(default)]
    pub date_created_gmt: Option<String>,
    #[serde(default)]
    pub line_items: Vec<WcLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WcLineItem {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: i64,
}

impl From<WcOrder> for Order {
    fn from(order: WcOrder) -> Self {
        let created_at = order
            .date_created_gmt
            .as_deref()
            .and_then(parse_gmt_timestamp)
            .unwrap_or_default();

        Order {
            id: OrderId(order.id),
            customer_id: CustomerId(order.customer_id),
            // FromStr for OrderStatus is infallible
            status: order.status.parse().unwrap_or(OrderStatus::Other),
            items: order
                .line_items
                .into_iter()
                .map(|item| LineItem {
                    product_id: ProductId(item.product_id),
                    quantity: item.quantity.max(0) as u32,
                })
                .collect(),
            created_at,
        }
    }
}

/// Product resource from GET /products
#[derive(Debug, Clone, Deserialize)]
pub struct WcProduct {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub permalink: String,
    /// Decimal price as a string, e.g. "19.99"; empty for unpriced products
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub images: Vec<WcImage>,
    #[serde(default)]
    pub categories: Vec<WcCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WcImage {
    pub src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WcCategory {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub slug: String,
}

impl From<WcCategory> for Category {
    fn from(category: WcCategory) -> Self {
        Category {
            id: CategoryId(category.id),
            slug: category.slug,
            name: category.name,
        }
    }
}

impl From<WcProduct> for Product {
    fn from(product: WcProduct) -> Self {
        Product {
            id: ProductId(product.id),
            price: parse_price_minor(&product.price),
            name: product.name,
            image: product.images.into_iter().next().map(|image| image.src),
            permalink: product.permalink,
            categories: product.categories.into_iter().map(Category::from).collect(),
        }
    }
}

/// Body for PUT /orders/{id} that only touches meta data
#[derive(Debug, Serialize)]
pub struct WcOrderMetaUpdate {
    pub meta_data: Vec<WcMetaEntry>,
}

#[derive(Debug, Serialize)]
pub struct WcMetaEntry {
    pub key: String,
    pub value: String,
}

/// Error envelope returned by the WordPress REST API
#[derive(Debug, Deserialize)]
pub struct WcErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

fn parse_gmt_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Converts a decimal price string into minor units ("19.9" -> 1990)
pub fn parse_price_minor(raw: &str) -> i64 {
    let raw = raw.trim();
    let (negative, raw) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));

    let whole: i64 = whole.parse().unwrap_or(0);
    let cents: i64 = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(2)
        .collect::<String>()
        .parse()
        .unwrap_or(0);

    let Some(minor) = whole.checked_mul(100).and_then(|m| m.checked_add(cents)) else {
        tracing::warn!(price = raw, "Price out of range, treating as 0");
        return 0;
    };
    if negative {
        -minor
    } else {
        minor
    }
}
