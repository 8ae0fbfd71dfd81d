use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{CheckoutField, OrderId, ProductId, SavedField},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CheckoutFieldsRequest {
    #[serde(default)]
    pub cart: Vec<ProductId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutFieldsResponse {
    pub fields: Vec<CheckoutField>,
}

#[derive(Debug, Deserialize)]
pub struct SaveFieldsRequest {
    #[serde(default)]
    pub cart: Vec<ProductId>,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveFieldsResponse {
    pub order_id: OrderId,
    pub saved: Vec<SavedField>,
}

/// Extra checkout fields for the products in the cart
pub async fn fields(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckoutFieldsRequest>,
) -> AppResult<Json<CheckoutFieldsResponse>> {
    let fields = state.checkout.fields_for_cart(&request.cart).await?;
    Ok(Json(CheckoutFieldsResponse { fields }))
}

/// Persists submitted checkout field values on the order
pub async fn save_fields(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<SaveFieldsRequest>,
) -> AppResult<Json<SaveFieldsResponse>> {
    tracing::info!(
        request_id = %request_id,
        order_id = %order_id,
        submitted = request.values.len(),
        "Saving checkout fields"
    );

    let saved = state
        .checkout
        .save_submitted_fields(order_id, &request.cart, &request.values)
        .await?;

    Ok(Json(SaveFieldsResponse { order_id, saved }))
}
