use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    middleware::{make_span_with_request_id, request_id_middleware},
    models::FieldRule,
    services::{
        commerce::CommerceStore, AffinityRecommender, CheckoutCustomizer, RecommenderSettings,
    },
};

pub mod checkout;
pub mod recommendations;

/// Shared application state
///
/// The recommender and checkout customizer are built once at startup and
/// called explicitly by the handlers.
pub struct AppState {
    pub recommender: AffinityRecommender,
    pub checkout: CheckoutCustomizer,
    pub store_name: &'static str,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        settings: RecommenderSettings,
        rules: Vec<FieldRule>,
    ) -> Self {
        Self {
            store_name: store.name(),
            recommender: AffinityRecommender::new(store.clone(), settings),
            checkout: CheckoutCustomizer::new(store, rules),
        }
    }

    pub fn from_config(store: Arc<dyn CommerceStore>, config: &Config) -> Self {
        let settings = RecommenderSettings {
            max_results: config.recommendation_limit,
            top_categories: config.top_category_count,
        };
        let rules = vec![FieldRule::operating_system(
            config.electronic_category_slugs.clone(),
        )];
        Self::new(store, settings, rules)
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/customers/:customer_id/recommendations",
            get(recommendations::recommend),
        )
        .route("/checkout/fields", post(checkout::fields))
        .route(
            "/orders/:order_id/checkout-fields",
            post(checkout::save_fields),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::commerce::InMemoryStore;

    #[test]
    fn test_app_state_from_config() {
        let config: Config = envy::from_iter(vec![
            ("STORE_BACKEND".to_string(), "memory".to_string()),
            ("RECOMMENDATION_LIMIT".to_string(), "6".to_string()),
            ("ELECTRONIC_CATEGORY_SLUGS".to_string(), "phones".to_string()),
        ])
        .unwrap();

        let state = AppState::from_config(Arc::new(InMemoryStore::new()), &config);

        assert_eq!(state.store_name, "memory");
        assert_eq!(
            state.recommender.settings(),
            RecommenderSettings {
                max_results: 6,
                top_categories: 3,
            }
        );
        assert_eq!(state.checkout.rules().len(), 1);
        assert_eq!(state.checkout.rules()[0].field.key, "operating_system");
    }
}
