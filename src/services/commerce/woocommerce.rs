/// WooCommerce REST API (wc/v3) store
///
/// Authenticates with a consumer key/secret pair over HTTP basic auth.
///
/// API Flow:
/// 1. Orders: /orders?customer={id}&status=a,b → paged, 100 per page
/// 2. Product categories: /products/{id} → categories embedded in the product
/// 3. Catalog: /products?category={id}&exclude=... → one request per category,
///    merged in category rank order
use crate::{
    config::WooCommerceCredentials,
    error::{AppError, AppResult},
    models::{
        woocommerce::{WcErrorBody, WcMetaEntry, WcOrder, WcOrderMetaUpdate, WcProduct},
        CatalogQuery, Category, CustomerId, Order, OrderId, OrderStatus, Product, ProductId,
    },
    services::commerce::CommerceStore,
};
use reqwest::{Client as HttpClient, Response, StatusCode};
use std::collections::HashSet;

const ORDERS_PER_PAGE: usize = 100;
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

#[derive(Clone)]
pub struct WooCommerceStore {
    http_client: HttpClient,
    api_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl WooCommerceStore {
    pub fn new(credentials: WooCommerceCredentials) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: format!("{}/wp-json/wc/v3", credentials.base_url),
            consumer_key: credentials.consumer_key,
            consumer_secret: credentials.consumer_secret,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(format!("{}{}", self.api_url, path))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
    }

    /// Converts non-success responses into errors; 404 becomes `NotFound`
    async fn check(response: Response, what: &str) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<WcErrorBody>(&body)
            .map(|error| format!("{} ({})", error.message, error.code))
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{}: {}", what, message)));
        }

        tracing::error!(
            status = %status,
            body = %message,
            request = what,
            "WooCommerce API request failed"
        );
        Err(AppError::ExternalApi(format!(
            "WooCommerce API returned status {} for {}: {}",
            status, what, message
        )))
    }

    async fn fetch_product(&self, product_id: ProductId) -> AppResult<Product> {
        let what = format!("product {}", product_id);
        let response = self
            .get(&format!("/products/{}", product_id))
            .send()
            .await?;
        let product: WcProduct = Self::check(response, &what).await?.json().await?;
        Ok(product.into())
    }
}

/// Merges per-category result lists, dropping duplicates and stopping at `limit`
fn merge_ranked(batches: Vec<Vec<Product>>, limit: usize) -> Vec<Product> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|product| seen.insert(product.id))
        .take(limit)
        .collect()
}

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait::async_trait]
impl CommerceStore for WooCommerceStore {
    async fn find_orders(
        &self,
        customer_id: CustomerId,
        statuses: &[OrderStatus],
    ) -> AppResult<Vec<Order>> {
        let status_filter = join_ids(statuses);
        let per_page = ORDERS_PER_PAGE.to_string();
        let customer = customer_id.to_string();
        let mut orders = Vec::new();
        let mut page = 1usize;

        loop {
            let page_param = page.to_string();
            let response = self
                .get("/orders")
                .query(&[
                    ("customer", customer.as_str()),
                    ("status", status_filter.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await?;
            let response = Self::check(response, "orders").await?;

            let total_pages = response
                .headers()
                .get(TOTAL_PAGES_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<usize>().ok());

            let batch: Vec<WcOrder> = response.json().await?;
            let batch_len = batch.len();
            orders.extend(batch.into_iter().map(Order::from));

            let last_page = match total_pages {
                Some(total) => page >= total,
                None => batch_len < ORDERS_PER_PAGE,
            };
            if last_page {
                break;
            }
            page += 1;
        }

        // Server-side filtering is trusted, but statuses are re-checked locally
        orders.retain(|order| statuses.contains(&order.status));

        tracing::debug!(
            customer_id = %customer_id,
            order_count = orders.len(),
            pages = page,
            store = "woocommerce",
            "Orders fetched"
        );

        Ok(orders)
    }

    async fn categories_of(&self, product_id: ProductId) -> AppResult<Vec<Category>> {
        Ok(self.fetch_product(product_id).await?.categories)
    }

    async fn find_products(&self, query: &CatalogQuery) -> AppResult<Vec<Product>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let exclude = join_ids(&query.exclude_product_ids);
        let per_page = query.limit.to_string();
        let mut batches = Vec::with_capacity(query.category_ids.len());

        for category_id in &query.category_ids {
            let category = category_id.to_string();
            let mut params = vec![
                ("category", category.as_str()),
                ("per_page", per_page.as_str()),
                ("status", "publish"),
                ("orderby", "date"),
                ("order", "desc"),
            ];
            if !exclude.is_empty() {
                params.push(("exclude", exclude.as_str()));
            }

            let response = self.get("/products").query(&params).send().await?;
            let products: Vec<WcProduct> = Self::check(response, "products").await?.json().await?;
            batches.push(products.into_iter().map(Product::from).collect());
        }

        let products = merge_ranked(batches, query.limit);

        tracing::debug!(
            categories = query.category_ids.len(),
            excluded = query.exclude_product_ids.len(),
            results = products.len(),
            store = "woocommerce",
            "Catalog query completed"
        );

        Ok(products)
    }

    async fn find_product(&self, product_id: ProductId) -> AppResult<Option<Product>> {
        match self.fetch_product(product_id).await {
            Ok(product) => Ok(Some(product)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_order_meta(&self, order_id: OrderId, key: &str, value: &str) -> AppResult<()> {
        let body = WcOrderMetaUpdate {
            meta_data: vec![WcMetaEntry {
                key: key.to_string(),
                value: value.to_string(),
            }],
        };

        let response = self
            .http_client
            .put(format!("{}/orders/{}", self.api_url, order_id))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .json(&body)
            .send()
            .await?;
        Self::check(response, &format!("order {}", order_id)).await?;

        tracing::info!(order_id = %order_id, meta_key = %key, store = "woocommerce", "Order meta saved");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "woocommerce"
    }
}
