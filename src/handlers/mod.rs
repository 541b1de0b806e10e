pub mod dashboard;
pub mod products;

use axum::{extract::State, response::Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

/// Routes mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::products_router())
        .merge(dashboard::dashboard_router())
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.store.snapshot();
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "catalog_version": snapshot.version(),
        "products": snapshot.catalog().len(),
        "connection_status": state.feed.status(),
    }))
}
