#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use serde_json::Value;
use stockpulse::{
    config::{AppConfig, CatalogSettings, FeedSettings},
    services::{
        catalog::{seed_catalog, CatalogStore},
        live_feed::{FeedConnector, LiveFeed, TickSource},
    },
    AppState,
};
use tower::ServiceExt;

/// Feed settings with a fixed seed and no auto-connect.
pub fn feed_settings(tick_interval_ms: u64) -> FeedSettings {
    FeedSettings {
        auto_connect: false,
        tick_interval_ms,
        seed: Some(42),
        ..FeedSettings::default()
    }
}

/// Store preloaded with the five demo products.
pub fn seeded_store() -> Arc<CatalogStore> {
    let store = CatalogStore::new(CatalogSettings::default());
    store
        .load(seed_catalog(Utc::now()))
        .expect("demo catalog loads");
    Arc::new(store)
}

pub fn live_feed(
    store: Arc<CatalogStore>,
    settings: FeedSettings,
    connector: Arc<dyn FeedConnector>,
) -> LiveFeed {
    let source = TickSource::from_settings(&settings);
    LiveFeed::new(store, settings, connector, source)
}

/// Router plus state over the demo catalog, feed left disconnected.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let cfg = AppConfig {
            environment: "test".to_string(),
            feed: feed_settings(50),
            ..AppConfig::default()
        };
        let state = AppState::new(&cfg, None);
        state
            .store
            .load(seed_catalog(Utc::now()))
            .expect("demo catalog loads");

        Self {
            router: stockpulse::app(state.clone()),
            state,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
