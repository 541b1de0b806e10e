/*!
 * # Live Feed
 *
 * Simulates the real-time update stream: on a fixed interval one product is
 * picked at random and nudged (stock down by one, a fresh sales sample),
 * then committed through the catalog store, which re-forecasts the whole
 * catalog in the same step.
 *
 * Randomness comes from an injectable [`TickSource`], so tests can replay
 * exact sequences. A failed connection only flips the status to
 * disconnected; calling [`LiveFeed::connect`] again retries.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::{oneshot, watch, Mutex},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::FeedSettings,
    errors::ServiceError,
    events::{CatalogEvent, EventSender},
    models::{ConnectionStatus, Product},
    services::catalog::{CatalogAction, CatalogStore, Dispatched},
};

/// One randomized mutation, drawn up front and applied by the catalog
/// reducer against whatever catalog is committed at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedTick {
    /// Position in `[0, 1)` used to pick the product.
    pub pick: f64,
    pub decrement_stock: bool,
    /// New sales sample, appended only if stock stays above zero.
    pub sale: Option<u32>,
    pub at: DateTime<Utc>,
}

impl FeedTick {
    /// Index of the product this tick targets, `None` for an empty catalog.
    pub fn index_for(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let scaled = (self.pick.clamp(0.0, 1.0) * len as f64) as usize;
        Some(scaled.min(len - 1))
    }

    pub fn apply(&self, product: &Product) -> Product {
        let mut updated = product.clone();
        if self.decrement_stock {
            updated.stock = updated.stock.saturating_sub(1);
        }
        if let Some(sample) = self.sale {
            if updated.stock > 0 {
                updated.push_sale(sample);
            }
        }
        updated.last_updated = self.at;
        updated
    }
}

/// Random source for feed ticks.
pub struct TickSource {
    rng: Box<dyn RngCore + Send>,
}

impl TickSource {
    pub fn new<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self { rng: Box::new(rng) }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn from_settings(settings: &FeedSettings) -> Self {
        match settings.seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn draw(&mut self, settings: &FeedSettings, at: DateTime<Utc>) -> FeedTick {
        let pick = self.rng.gen::<f64>();
        let decrement_stock = self.rng.gen::<f64>() < settings.stock_decrement_probability;
        let wants_sale = self.rng.gen::<f64>() < settings.sales_update_probability;

        let low = settings.sample_min.min(settings.sample_max);
        let high = settings.sample_min.max(settings.sample_max);
        let sale = wants_sale.then(|| self.rng.gen_range(low..=high));

        FeedTick {
            pick,
            decrement_stock,
            sale,
            at,
        }
    }
}

/// Establishes the upstream connection the feed depends on.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<(), ServiceError>;
}

/// Local stand-in for a real-time backend.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    fail: bool,
}

impl SimulatedConnector {
    pub fn new(fail: bool) -> Self {
        Self { fail }
    }
}

#[async_trait]
impl FeedConnector for SimulatedConnector {
    async fn connect(&self) -> Result<(), ServiceError> {
        if self.fail {
            return Err(ServiceError::FeedConnection(
                "simulated connection refused".to_string(),
            ));
        }
        debug!("Simulated feed connection established");
        Ok(())
    }
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the periodic mutation task and its connection status.
pub struct LiveFeed {
    store: Arc<CatalogStore>,
    settings: FeedSettings,
    connector: Arc<dyn FeedConnector>,
    source: Arc<Mutex<TickSource>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    worker: Mutex<Option<Worker>>,
    events: Option<EventSender>,
}

impl LiveFeed {
    pub fn new(
        store: Arc<CatalogStore>,
        settings: FeedSettings,
        connector: Arc<dyn FeedConnector>,
        source: TickSource,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            store,
            settings,
            connector,
            source: Arc::new(Mutex::new(source)),
            status: Arc::new(status),
            worker: Mutex::new(None),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Connects and starts the mutation loop. Connection failures are
    /// reported through the returned status, never as an error.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> ConnectionStatus {
        let mut worker = self.worker.lock().await;
        match worker.take() {
            Some(running) if !running.handle.is_finished() => {
                *worker = Some(running);
                debug!("Live feed already connected");
                return ConnectionStatus::Connected;
            }
            Some(dead) => {
                let reason = match dead.handle.await {
                    Err(e) => format!("feed task failed: {}", e),
                    Ok(()) => "feed task stopped".to_string(),
                };
                warn!("Live feed task was gone, reconnecting: {}", reason);
                self.set_status(ConnectionStatus::Disconnected);
                self.publish(CatalogEvent::FeedDisconnected {
                    reason: Some(reason),
                })
                .await;
            }
            None => {}
        }

        if let Err(e) = self.connector.connect().await {
            error!("Live feed connection failed: {}", e);
            self.set_status(ConnectionStatus::Disconnected);
            self.publish(CatalogEvent::FeedDisconnected {
                reason: Some(e.to_string()),
            })
            .await;
            return ConnectionStatus::Disconnected;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(
            self.store.clone(),
            self.source.clone(),
            self.settings.clone(),
            StatusGuard(self.status.clone()),
            shutdown_rx,
        ));
        *worker = Some(Worker { shutdown, handle });

        info!(
            interval_ms = self.settings.tick_interval_ms,
            "Live feed connected"
        );
        self.set_status(ConnectionStatus::Connected);
        self.publish(CatalogEvent::FeedConnected).await;
        ConnectionStatus::Connected
    }

    /// Stops the loop and waits for it, so no mutation runs afterwards.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.shutdown.send(());
        if let Err(e) = worker.handle.await {
            warn!("Live feed task ended abnormally: {}", e);
        }

        info!("Live feed disconnected");
        self.set_status(ConnectionStatus::Disconnected);
        self.publish(CatalogEvent::FeedDisconnected { reason: None })
            .await;
    }

    /// Runs one mutation cycle immediately.
    pub async fn tick_now(&self) -> Result<Dispatched, ServiceError> {
        apply_tick(&self.store, &self.source, &self.settings).await
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    /// Lifecycle events are rare, so they wait for channel capacity.
    async fn publish(&self, event: CatalogEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.send(event).await {
                warn!("{}", e);
            }
        }
    }
}

async fn apply_tick(
    store: &CatalogStore,
    source: &Mutex<TickSource>,
    settings: &FeedSettings,
) -> Result<Dispatched, ServiceError> {
    let tick = source.lock().await.draw(settings, Utc::now());
    store.dispatch(CatalogAction::FeedTick(tick))
}

/// Flips the status to disconnected when the loop ends, including by panic.
struct StatusGuard(Arc<watch::Sender<ConnectionStatus>>);

impl Drop for StatusGuard {
    fn drop(&mut self) {
        self.0.send_replace(ConnectionStatus::Disconnected);
    }
}

async fn run_loop(
    store: Arc<CatalogStore>,
    source: Arc<Mutex<TickSource>>,
    settings: FeedSettings,
    _status: StatusGuard,
    mut shutdown: oneshot::Receiver<()>,
) {
    let period = Duration::from_millis(settings.tick_interval_ms.max(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = apply_tick(&store, &source, &settings).await {
                    warn!("Live feed update rejected: {}", e);
                }
            }
        }
    }

    debug!("Live feed loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product(stock: u32) -> Product {
        Product {
            id: 1,
            name: "Lamp".into(),
            description: None,
            price: Decimal::TEN,
            stock,
            category: "general".into(),
            image_url: String::new(),
            sales_data: vec![1, 2, 3, 4, 5, 6],
            last_updated: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn tick(decrement_stock: bool, sale: Option<u32>) -> FeedTick {
        FeedTick {
            pick: 0.0,
            decrement_stock,
            sale,
            at: Utc::now(),
        }
    }

    #[test]
    fn stock_never_goes_below_zero() {
        let updated = tick(true, None).apply(&product(0));
        assert_eq!(updated.stock, 0);
        let updated = tick(true, None).apply(&product(3));
        assert_eq!(updated.stock, 2);
    }

    #[test]
    fn sale_is_skipped_when_stock_runs_out() {
        let updated = tick(true, Some(9)).apply(&product(1));
        assert_eq!(updated.stock, 0);
        assert_eq!(updated.sales_data, vec![1, 2, 3, 4, 5, 6]);

        let updated = tick(false, Some(9)).apply(&product(1));
        assert_eq!(updated.sales_data, vec![2, 3, 4, 5, 6, 9]);
    }

    #[test]
    fn apply_stamps_mutation_time() {
        let t = tick(false, None);
        assert_eq!(t.apply(&product(5)).last_updated, t.at);
    }

    #[test]
    fn index_covers_whole_catalog() {
        let mut t = tick(false, None);
        assert_eq!(t.index_for(0), None);
        t.pick = 0.0;
        assert_eq!(t.index_for(5), Some(0));
        t.pick = 0.999_999;
        assert_eq!(t.index_for(5), Some(4));
        t.pick = 1.0;
        assert_eq!(t.index_for(5), Some(4));
    }

    #[test]
    fn seeded_sources_repeat() {
        let settings = FeedSettings::default();
        let at = Utc::now();
        let mut a = TickSource::seeded(7);
        let mut b = TickSource::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.draw(&settings, at), b.draw(&settings, at));
        }
    }

    #[test]
    fn samples_stay_in_configured_range() {
        let settings = FeedSettings {
            sales_update_probability: 1.0,
            sample_min: 3,
            sample_max: 5,
            ..FeedSettings::default()
        };
        let mut source = TickSource::seeded(11);
        for _ in 0..200 {
            let sale = source.draw(&settings, Utc::now()).sale.unwrap();
            assert!((3..=5).contains(&sale));
        }
    }
}
