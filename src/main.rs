use std::net::SocketAddr;

use anyhow::Context;
use chrono::Utc;
use tokio::{signal, sync::mpsc};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use stockpulse as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let app_state = api::AppState::new(&cfg, Some(event_sender));

    if cfg.catalog.seed_demo_data {
        let snapshot = app_state
            .store
            .load(api::services::catalog::seed_catalog(Utc::now()))
            .context("failed to load demo catalog")?;
        info!("Demo catalog seeded with {} products", snapshot.catalog().len());
    }

    if cfg.feed.auto_connect {
        let status = app_state.feed.connect().await;
        if !status.is_connected() {
            warn!("Live feed unavailable at startup; POST /api/v1/feed/connect to retry");
        }
    }

    let cors_layer = if cfg.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let app = api::app(app_state.clone()).layer(cors_layer);

    let addr: SocketAddr = cfg
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind_address()))?;
    info!("stockpulse listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.feed.disconnect().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
