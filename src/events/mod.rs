use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::ServiceError;

/// Stock level below which an update is reported as low inventory
pub const LOW_STOCK_THRESHOLD: u32 = 10;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<CatalogEvent>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<CatalogEvent>) -> Self {
        Self { sender }
    }

    /// Publishes without waiting; the catalog writer must never block on a
    /// slow consumer, so a full channel drops the event.
    pub fn publish(&self, event: CatalogEvent) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping catalog event: {}", e);
        }
    }

    /// Sends an event, waiting for channel capacity
    pub async fn send(&self, event: CatalogEvent) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }
}

// Things that happened to the catalog or the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatalogEvent {
    CatalogLoaded {
        version: u64,
        products: usize,
    },
    ProductAdded {
        version: u64,
        product_id: u64,
    },
    ProductUpdated {
        version: u64,
        product_id: u64,
        stock: u32,
    },
    ProductDeleted {
        version: u64,
        product_id: u64,
    },
    FeedApplied {
        version: u64,
        product_id: u64,
        stock: u32,
        at: DateTime<Utc>,
    },
    FeedConnected,
    FeedDisconnected {
        reason: Option<String>,
    },
}

// Drains the channel and reports each event until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<CatalogEvent>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            CatalogEvent::CatalogLoaded { version, products } => {
                info!(version, products, "Catalog loaded");
            }
            CatalogEvent::ProductAdded {
                version,
                product_id,
            } => {
                info!(version, product_id, "Product added");
            }
            CatalogEvent::ProductUpdated {
                version,
                product_id,
                stock,
            } => {
                info!(version, product_id, stock, "Product updated");
                report_low_stock(product_id, stock);
            }
            CatalogEvent::ProductDeleted {
                version,
                product_id,
            } => {
                info!(version, product_id, "Product deleted");
            }
            CatalogEvent::FeedApplied {
                version,
                product_id,
                stock,
                at,
            } => {
                info!(version, product_id, stock, at = %at, "Live update applied");
                report_low_stock(product_id, stock);
            }
            CatalogEvent::FeedConnected => {
                info!("Real-time updates connected");
            }
            CatalogEvent::FeedDisconnected { reason } => match reason {
                Some(reason) => warn!("Real-time updates disconnected: {}", reason),
                None => info!("Real-time updates disconnected"),
            },
        }
    }

    warn!("Event processing loop has ended");
}

fn report_low_stock(product_id: u64, stock: u32) {
    if stock < LOW_STOCK_THRESHOLD {
        warn!(
            "Low inventory alert: product {} has only {} units remaining",
            product_id, stock
        );
    }
}
