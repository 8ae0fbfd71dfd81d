use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

pub mod checkout;
pub mod woocommerce;

pub use checkout::{
    CartCondition, CheckoutField, FieldKind, FieldOption, FieldRule, FieldSection, SavedField,
};

/// Declares an integer identifier newtype as used by the commerce platform
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Shopper (customer user) identifier
    CustomerId
);
entity_id!(OrderId);
entity_id!(ProductId);
entity_id!(CategoryId);

/// Order lifecycle status as reported by the commerce platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    CheckoutDraft,
    #[serde(other)]
    Other,
}

impl OrderStatus {
    /// Statuses whose orders count as purchase history
    pub const QUALIFYING: [OrderStatus; 2] = [OrderStatus::Completed, OrderStatus::Processing];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::CheckoutDraft => "checkout-draft",
            OrderStatus::Other => "other",
        }
    }

    pub fn counts_toward_history(&self) -> bool {
        Self::QUALIFYING.contains(self)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    /// Accepts both bare and `wc-` prefixed status names; anything unknown is `Other`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim_start_matches("wc-") {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "on-hold" => OrderStatus::OnHold,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            "failed" => OrderStatus::Failed,
            "checkout-draft" => OrderStatus::CheckoutDraft,
            _ => OrderStatus::Other,
        };
        Ok(status)
    }
}

/// A single purchased line on an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    /// Price in minor currency units
    pub price: i64,
    pub permalink: String,
    pub categories: Vec<Category>,
}

/// Catalog search: products in any of `category_ids`, none of `exclude_product_ids`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogQuery {
    pub category_ids: Vec<CategoryId>,
    pub exclude_product_ids: Vec<ProductId>,
    pub limit: usize,
}

/// Display data for one recommended product, returned to the checkout page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedProduct {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price: i64,
    pub permalink: String,
}

impl From<Product> for RecommendedProduct {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            image: product.image,
            price: product.price,
            permalink: product.permalink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_serializes_transparently() {
        let json = serde_json::to_string(&ProductId(42)).unwrap();
        assert_eq!(json, "42");

        let ids: Vec<ProductId> = serde_json::from_str("[1, 7]").unwrap();
        assert_eq!(ids, vec![ProductId(1), ProductId(7)]);
    }

    #[test]
    fn test_order_status_parses_prefixed_names() {
        assert_eq!("wc-completed".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert_eq!("on-hold".parse::<OrderStatus>().unwrap(), OrderStatus::OnHold);
        assert_eq!("trash".parse::<OrderStatus>().unwrap(), OrderStatus::Other);
    }

    #[test]
    fn test_order_status_serde_unknown_is_other() {
        let status: OrderStatus = serde_json::from_str(r#""subscription-renewal""#).unwrap();
        assert_eq!(status, OrderStatus::Other);

        let json = serde_json::to_string(&OrderStatus::CheckoutDraft).unwrap();
        assert_eq!(json, r#""checkout-draft""#);
    }

    #[test]
    fn test_only_completed_and_processing_count_toward_history() {
        assert!(OrderStatus::Completed.counts_toward_history());
        assert!(OrderStatus::Processing.counts_toward_history());
        assert!(!OrderStatus::Pending.counts_toward_history());
        assert!(!OrderStatus::Refunded.counts_toward_history());
        assert!(!OrderStatus::Other.counts_toward_history());
    }

    #[test]
    fn test_recommended_product_from_product_drops_categories() {
        let product = Product {
            id: ProductId(9),
            name: "USB-C Hub".to_string(),
            image: Some("https://shop.test/hub.jpg".to_string()),
            price: 3499,
            permalink: "https://shop.test/product/hub".to_string(),
            categories: vec![Category {
                id: CategoryId(1),
                slug: "electronics".to_string(),
                name: "Electronics".to_string(),
            }],
        };

        let recommended = RecommendedProduct::from(product);
        assert_eq!(recommended.id, ProductId(9));
        assert_eq!(recommended.name, "USB-C Hub");
        assert_eq!(recommended.price, 3499);
    }
}
