use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{CustomerId, RecommendedProduct},
    routes::AppState,
};

/// "You Might Also Like" block contents; an empty list means render nothing
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub customer_id: CustomerId,
    pub products: Vec<RecommendedProduct>,
}

/// Handler for the checkout recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(customer_id): Path<CustomerId>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        customer_id = %customer_id,
        store = state.store_name,
        "Processing recommendation request"
    );

    let products = state
        .recommender
        .recommend_products(customer_id)
        .await
        .inspect_err(|e| {
            if e.is_collaborator_failure() {
                tracing::warn!(
                    request_id = %request_id,
                    customer_id = %customer_id,
                    error = %e,
                    "Commerce store unavailable, recommendations omitted"
                );
            } else {
                tracing::error!(
                    request_id = %request_id,
                    customer_id = %customer_id,
                    error = %e,
                    "Recommendation failed"
                );
            }
        })?;

    Ok(Json(RecommendationResponse {
        customer_id,
        products: products.into_iter().map(RecommendedProduct::from).collect(),
    }))
}
