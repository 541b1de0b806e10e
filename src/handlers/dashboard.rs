use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    models::{CategoryFilter, ConnectionStatus, ViewFilter},
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub search: Option<String>,
    /// Category name or "all"
    #[serde(default)]
    pub category: Option<String>,
}

impl DashboardQuery {
    pub fn filter(&self) -> ViewFilter {
        ViewFilter::new(
            self.search.as_deref().unwrap_or_default(),
            CategoryFilter::parse(self.category.as_deref().unwrap_or_default()),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedStatusResponse {
    pub status: ConnectionStatus,
}

pub fn dashboard_router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/categories", get(categories))
        .route("/feed/status", get(feed_status))
        .route("/feed/connect", post(connect_feed))
        .route("/feed/disconnect", post(disconnect_feed))
}

/// Catalog, predictions and their filtered views from one snapshot
async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let filter = query.filter();
    let snapshot = state.store.snapshot();
    debug!(
        version = snapshot.version(),
        search = filter.search(),
        category = ?filter.category,
        "Serving dashboard"
    );
    Json(snapshot.dashboard(&filter, state.feed.status()))
}

async fn categories(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.snapshot().categories())
}

async fn feed_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(FeedStatusResponse {
        status: state.feed.status(),
    })
}

async fn connect_feed(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.feed.connect().await;
    Json(FeedStatusResponse { status })
}

async fn disconnect_feed(State(state): State<AppState>) -> impl IntoResponse {
    state.feed.disconnect().await;
    Json(FeedStatusResponse {
        status: state.feed.status(),
    })
}
