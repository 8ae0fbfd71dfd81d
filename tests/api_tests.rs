use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use checkout_customizer::{
    error::{AppError, AppResult},
    middleware::request_id::REQUEST_ID_HEADER,
    models::{
        CatalogQuery, Category, CategoryId, CustomerId, FieldRule, LineItem, Order, OrderId,
        OrderStatus, Product, ProductId,
    },
    routes::{create_router, AppState},
    services::{
        commerce::{CommerceStore, InMemoryStore},
        RecommenderSettings,
    },
};

fn category(id: i64, slug: &str) -> Category {
    Category {
        id: CategoryId(id),
        slug: slug.to_string(),
        name: slug.to_string(),
    }
}

fn product(id: i64, name: &str, categories: Vec<Category>) -> Product {
    Product {
        id: ProductId(id),
        name: name.to_string(),
        image: Some(format!("https://shop.test/images/{}.jpg", id)),
        price: 2500,
        permalink: format!("https://shop.test/product/{}", id),
        categories,
    }
}

fn order(id: i64, customer: i64, status: OrderStatus, products: &[i64]) -> Order {
    Order {
        id: OrderId(id),
        customer_id: CustomerId(customer),
        status,
        items: products
            .iter()
            .map(|&product_id| LineItem {
                product_id: ProductId(product_id),
                quantity: 1,
            })
            .collect(),
        created_at: Utc::now(),
    }
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let electronics = category(1, "electronics");
    let books = category(2, "books");

    store.insert_product(product(10, "Laptop Stand", vec![electronics.clone()])).await;
    store.insert_product(product(11, "Webcam", vec![electronics.clone()])).await;
    store.insert_product(product(12, "Headphones", vec![electronics])).await;
    store.insert_product(product(20, "Rust in Action", vec![books.clone()])).await;
    store.insert_product(product(21, "Zero to Production", vec![books])).await;

    store.insert_order(order(100, 1, OrderStatus::Completed, &[10, 20])).await;
    store.insert_order(order(101, 1, OrderStatus::Processing, &[12])).await;
    store.insert_order(order(200, 2, OrderStatus::Pending, &[10])).await;
    store
}

fn create_test_app(store: Arc<dyn CommerceStore>) -> Router {
    let state = AppState::new(
        store,
        RecommenderSettings::default(),
        vec![FieldRule::operating_system(vec![
            "electronics".to_string(),
            "computers".to_string(),
            "laptops".to_string(),
        ])],
    );
    create_router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Store whose backing platform is unreachable
struct UnavailableStore;

#[async_trait::async_trait]
impl CommerceStore for UnavailableStore {
    async fn find_orders(&self, _: CustomerId, _: &[OrderStatus]) -> AppResult<Vec<Order>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn categories_of(&self, _: ProductId) -> AppResult<Vec<Category>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn find_products(&self, _: &CatalogQuery) -> AppResult<Vec<Product>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn find_product(&self, _: ProductId) -> AppResult<Option<Product>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn save_order_meta(&self, _: OrderId, _: &str, _: &str) -> AppResult<()> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::new(InMemoryStore::new()));
    let response = app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(Arc::new(InMemoryStore::new()));
    let request_id = "6f1d2c1e-8a4b-4b8e-9a57-0c2f5b1d9e11";
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, request_id)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        request_id
    );
}

#[tokio::test]
async fn test_recommendations_exclude_purchased_products() {
    let app = create_test_app(seeded_store().await);

    let (status, body) = send(&app, get("/api/v1/customers/1/recommendations")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer_id"], 1);
    let products = body["products"].as_array().unwrap();
    let ids: Vec<i64> = products.iter().map(|p| p["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![21, 11]);

    assert_eq!(products[1]["name"], "Webcam");
    assert_eq!(products[1]["price"], 2500);
    assert_eq!(products[1]["permalink"], "https://shop.test/product/11");
    assert!(products[1].get("categories").is_none());
}

#[tokio::test]
async fn test_recommendations_empty_without_qualifying_orders() {
    let app = create_test_app(seeded_store().await);

    for customer in [2, 999] {
        let uri = format!("/api/v1/customers/{}/recommendations", customer);
        let (status, body) = send(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"], json!([]));
    }
}

#[tokio::test]
async fn test_recommendations_reject_malformed_customer_id() {
    let app = create_test_app(seeded_store().await);
    let response = app
        .oneshot(get("/api/v1/customers/abc/recommendations"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_report_unavailable_store() {
    let app = create_test_app(Arc::new(UnavailableStore));

    let (status, body) = send(&app, get("/api/v1/customers/1/recommendations")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "connection refused");
}

#[tokio::test]
async fn test_checkout_fields_for_electronics_cart() {
    let app = create_test_app(seeded_store().await);

    let (status, body) = send(
        &app,
        post_json("/api/v1/checkout/fields", json!({ "cart": [20, 11] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0]["key"], "operating_system");
    assert_eq!(fields[0]["kind"], "select");
    assert_eq!(fields[0]["required"], true);
    assert_eq!(fields[0]["options"][3]["value"], "linux");
}

#[tokio::test]
async fn test_checkout_fields_for_books_only_cart() {
    let app = create_test_app(seeded_store().await);

    let (status, body) = send(
        &app,
        post_json("/api/v1/checkout/fields", json!({ "cart": [20, 21] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"], json!([]));
}

#[tokio::test]
async fn test_save_checkout_fields_persists_order_meta() {
    let store = seeded_store().await;
    let app = create_test_app(store.clone());

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/orders/100/checkout-fields",
            json!({ "cart": [10], "values": { "operating_system": "macos\n" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], 100);
    assert_eq!(body["saved"][0]["meta_key"], "_operating_system");
    assert_eq!(body["saved"][0]["value"], "macos");

    let meta = store.order_meta(OrderId(100)).await;
    assert_eq!(meta.get("_operating_system").map(String::as_str), Some("macos"));
}

#[tokio::test]
async fn test_save_checkout_fields_requires_operating_system() {
    let store = seeded_store().await;
    let app = create_test_app(store.clone());

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/orders/100/checkout-fields",
            json!({ "cart": [10], "values": { "operating_system": "" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Operating System"));
    assert!(store.order_meta(OrderId(100)).await.is_empty());
}

#[tokio::test]
async fn test_save_checkout_fields_unknown_order() {
    let app = create_test_app(seeded_store().await);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/orders/4040/checkout-fields",
            json!({ "cart": [10], "values": { "operating_system": "linux" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
