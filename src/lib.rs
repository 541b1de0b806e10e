//! StockPulse Library
//!
//! Inventory dashboard core: the product catalog with its per-product sales
//! forecasts, a simulated live update feed and the filtered views the
//! dashboard reads.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    config::AppConfig,
    events::EventSender,
    services::{
        catalog::CatalogStore,
        live_feed::{LiveFeed, SimulatedConnector, TickSource},
    },
};

pub use handlers::api_v1_routes;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CatalogStore>,
    pub feed: Arc<LiveFeed>,
}

impl AppState {
    /// Wires a catalog store and a simulated live feed from configuration.
    pub fn new(cfg: &AppConfig, events: Option<EventSender>) -> Self {
        let mut store = CatalogStore::new(cfg.catalog.clone());
        if let Some(sender) = &events {
            store = store.with_events(sender.clone());
        }
        let store = Arc::new(store);

        let connector = Arc::new(SimulatedConnector::new(cfg.feed.simulate_connect_failure));
        let mut feed = LiveFeed::new(
            store.clone(),
            cfg.feed.clone(),
            connector,
            TickSource::from_settings(&cfg.feed),
        );
        if let Some(sender) = events {
            feed = feed.with_events(sender);
        }

        Self {
            store,
            feed: Arc::new(feed),
        }
    }
}

/// Full HTTP surface: health check plus the versioned API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "stockpulse up" }))
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
