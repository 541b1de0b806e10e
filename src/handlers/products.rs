use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{info, instrument};

use crate::{
    errors::ServiceError,
    models::{Product, ProductDraft},
    AppState,
};

/// Create the product router
pub fn products_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/trend", get(get_trend))
}

async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    Json(snapshot.catalog().to_vec())
}

#[instrument(skip(state, draft))]
async fn create_product(
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.store.add_product(draft)?;
    info!(product_id = product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .store
        .snapshot()
        .product(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
}

#[instrument(skip(state, product))]
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(product): Json<Product>,
) -> Result<impl IntoResponse, ServiceError> {
    if product.id != id {
        return Err(ServiceError::InvalidInput(format!(
            "Path id {} does not match body id {}",
            id, product.id
        )));
    }
    let product = state.store.update_product(product)?;
    info!(product_id = id, "Product updated");
    Ok(Json(product))
}

#[instrument(skip(state))]
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ServiceError> {
    state.store.delete_product(id)?;
    info!(product_id = id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Actual and forecast sales for charting
async fn get_trend(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .store
        .snapshot()
        .trend_series(id)
        .map(Json)
        .ok_or_else(|| ServiceError::NotFound(format!("No trend for product {}", id)))
}
