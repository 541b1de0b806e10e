/*!
 * # Catalog State
 *
 * The catalog and its predictions live together in an immutable
 * [`CatalogSnapshot`]. Every change goes through [`CatalogStore::dispatch`],
 * which reduces the action against the committed snapshot, re-runs the
 * forecast over the whole new catalog and publishes both halves in a single
 * swap. Readers only ever see complete snapshots.
 */

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::{
    config::CatalogSettings,
    errors::ServiceError,
    events::{CatalogEvent, EventSender},
    models::{
        ConnectionStatus, DashboardView, FilteredView, Product, ProductDraft, TrendPrediction,
        TrendSeries, ViewFilter, KNOWN_CATEGORIES,
    },
    services::{forecasting, live_feed::FeedTick},
};

/// A committed catalog paired with the predictions computed from it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogSnapshot {
    version: u64,
    catalog: Vec<Product>,
    predictions: Vec<TrendPrediction>,
}

impl CatalogSnapshot {
    fn commit(version: u64, catalog: Vec<Product>) -> Self {
        let predictions = forecasting::forecast(&catalog);
        Self {
            version,
            catalog,
            predictions,
        }
    }

    /// Incremented on every committed change; 0 for the initial empty state.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn catalog(&self) -> &[Product] {
        &self.catalog
    }

    pub fn predictions(&self) -> &[TrendPrediction] {
        &self.predictions
    }

    pub fn product(&self, id: u64) -> Option<&Product> {
        self.catalog.iter().find(|p| p.id == id)
    }

    pub fn prediction(&self, id: u64) -> Option<&TrendPrediction> {
        self.predictions.iter().find(|p| p.product_id == id)
    }

    /// Products matching the filter and only the predictions whose product
    /// made it through.
    pub fn filtered(&self, filter: &ViewFilter) -> FilteredView {
        let products: Vec<Product> = self
            .catalog
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();

        let visible: HashSet<u64> = products.iter().map(|p| p.id).collect();
        let predictions = self
            .predictions
            .iter()
            .filter(|p| visible.contains(&p.product_id))
            .cloned()
            .collect();

        FilteredView {
            products,
            predictions,
        }
    }

    /// Chart series for one product, `None` once the product is gone.
    pub fn trend_series(&self, id: u64) -> Option<TrendSeries> {
        let product = self.product(id)?;
        let prediction = self.prediction(id)?;
        Some(TrendSeries::new(product, prediction))
    }

    /// Known categories first, then any others present in the catalog.
    pub fn categories(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        KNOWN_CATEGORIES
            .iter()
            .copied()
            .chain(self.catalog.iter().map(|p| p.category.as_str()))
            .filter(|c| seen.insert(c))
            .map(str::to_string)
            .collect()
    }

    pub fn dashboard(&self, filter: &ViewFilter, status: ConnectionStatus) -> DashboardView {
        let filtered = self.filtered(filter);
        DashboardView {
            version: self.version,
            catalog: self.catalog.clone(),
            predictions: self.predictions.clone(),
            filtered_catalog: filtered.products,
            filtered_predictions: filtered.predictions,
            connection_status: status,
        }
    }
}

/// The only ways the catalog can change.
#[derive(Debug, Clone)]
pub enum CatalogAction {
    /// Replace the whole catalog with one delivered by the external store.
    Load(Vec<Product>),
    Add(ProductDraft),
    Update(Product),
    Delete(u64),
    /// One live-feed mutation of a randomly picked product.
    FeedTick(FeedTick),
}

impl CatalogAction {
    fn name(&self) -> &'static str {
        match self {
            CatalogAction::Load(_) => "load",
            CatalogAction::Add(_) => "add",
            CatalogAction::Update(_) => "update",
            CatalogAction::Delete(_) => "delete",
            CatalogAction::FeedTick(_) => "feed_tick",
        }
    }
}

/// What a reduced action did, keyed by the product it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Loaded,
    Added(u64),
    Updated(u64),
    Deleted(u64),
    Fed(u64),
}

impl Effect {
    pub fn product_id(self) -> Option<u64> {
        match self {
            Effect::Loaded => None,
            Effect::Added(id) | Effect::Updated(id) | Effect::Deleted(id) | Effect::Fed(id) => {
                Some(id)
            }
        }
    }
}

/// New catalog contents produced by [`reduce`].
#[derive(Debug, Clone)]
pub struct Change {
    pub catalog: Vec<Product>,
    pub effect: Effect,
}

/// Applies `action` to `current`. `Ok(None)` means nothing changed; an error
/// means the action was rejected and nothing changed either.
pub fn reduce(
    current: &CatalogSnapshot,
    action: CatalogAction,
    settings: &CatalogSettings,
    now: DateTime<Utc>,
) -> Result<Option<Change>, ServiceError> {
    match action {
        CatalogAction::Load(products) => {
            let mut ids = HashSet::new();
            for product in &products {
                if product.id == 0 {
                    return Err(ServiceError::InvalidInput(format!(
                        "Product '{}' has no id",
                        product.name
                    )));
                }
                if !ids.insert(product.id) {
                    return Err(ServiceError::InvalidInput(format!(
                        "Duplicate product id {}",
                        product.id
                    )));
                }
                product.validate()?;
            }
            Ok(Some(Change {
                catalog: products,
                effect: Effect::Loaded,
            }))
        }
        CatalogAction::Add(draft) => {
            draft.validate()?;
            let id = next_id(&current.catalog)?;
            let product =
                draft.into_product(id, settings.sales_window_len, &settings.default_category, now);

            let mut catalog = current.catalog.clone();
            catalog.push(product);
            Ok(Some(Change {
                catalog,
                effect: Effect::Added(id),
            }))
        }
        CatalogAction::Update(mut product) => {
            product.validate()?;
            let existing = current
                .product(product.id)
                .ok_or_else(|| not_found(product.id))?;
            if existing.window_len() != product.window_len() {
                return Err(ServiceError::ValidationError(format!(
                    "Sales window of product {} must keep {} periods, got {}",
                    product.id,
                    existing.window_len(),
                    product.window_len()
                )));
            }

            product.last_updated = now;
            let id = product.id;
            Ok(Some(Change {
                catalog: replace(&current.catalog, product),
                effect: Effect::Updated(id),
            }))
        }
        CatalogAction::Delete(id) => {
            if current.product(id).is_none() {
                return Err(not_found(id));
            }
            let catalog = current
                .catalog
                .iter()
                .filter(|p| p.id != id)
                .cloned()
                .collect();
            Ok(Some(Change {
                catalog,
                effect: Effect::Deleted(id),
            }))
        }
        CatalogAction::FeedTick(tick) => {
            let Some(index) = tick.index_for(current.catalog.len()) else {
                return Ok(None);
            };
            let updated = tick.apply(&current.catalog[index]);
            let id = updated.id;
            Ok(Some(Change {
                catalog: replace(&current.catalog, updated),
                effect: Effect::Fed(id),
            }))
        }
    }
}

fn next_id(catalog: &[Product]) -> Result<u64, ServiceError> {
    catalog
        .iter()
        .map(|p| p.id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| ServiceError::InvalidInput("product id space exhausted".to_string()))
}

/// Copy of `catalog` with the entry sharing `updated.id` swapped out.
fn replace(catalog: &[Product], updated: Product) -> Vec<Product> {
    catalog
        .iter()
        .map(|p| {
            if p.id == updated.id {
                updated.clone()
            } else {
                p.clone()
            }
        })
        .collect()
}

fn not_found(id: u64) -> ServiceError {
    ServiceError::NotFound(format!("Product {} not found", id))
}

/// Result of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub snapshot: Arc<CatalogSnapshot>,
    /// `None` when the action was a no-op.
    pub effect: Option<Effect>,
}

/// Single-writer owner of the catalog state.
pub struct CatalogStore {
    state: watch::Sender<Arc<CatalogSnapshot>>,
    settings: CatalogSettings,
    events: Option<EventSender>,
}

impl CatalogStore {
    pub fn new(settings: CatalogSettings) -> Self {
        let (state, _) = watch::channel(Arc::new(CatalogSnapshot::default()));
        Self {
            state,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// The latest committed snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.state.borrow().clone()
    }

    /// Receiver notified after every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.state.subscribe()
    }

    /// Reduces `action` and commits the result. Catalog and predictions are
    /// replaced together or not at all.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub fn dispatch(&self, action: CatalogAction) -> Result<Dispatched, ServiceError> {
        let now = Utc::now();
        let mut outcome = None;

        self.state.send_if_modified(|current| {
            let (result, modified) = match reduce(current, action, &self.settings, now) {
                Ok(Some(change)) => {
                    let next = Arc::new(CatalogSnapshot::commit(
                        current.version + 1,
                        change.catalog,
                    ));
                    *current = next.clone();
                    (Ok((next, Some(change.effect))), true)
                }
                Ok(None) => (Ok((current.clone(), None)), false),
                Err(e) => (Err(e), false),
            };
            outcome = Some(result);
            modified
        });

        let (snapshot, effect) = outcome
            .unwrap_or_else(|| Err(ServiceError::InternalError("dispatch did not run".into())))
            .map_err(|e| {
                warn!(error = %e, "Catalog action rejected");
                e
            })?;

        match effect {
            Some(effect) => {
                debug!(version = snapshot.version, ?effect, "Catalog committed");
                self.publish(&snapshot, effect);
            }
            None => debug!("Catalog action was a no-op"),
        }

        Ok(Dispatched { snapshot, effect })
    }

    #[instrument(skip(self, products), fields(count = products.len()))]
    pub fn load(&self, products: Vec<Product>) -> Result<Arc<CatalogSnapshot>, ServiceError> {
        let dispatched = self.dispatch(CatalogAction::Load(products))?;
        info!(
            version = dispatched.snapshot.version,
            "Catalog loaded with {} products",
            dispatched.snapshot.catalog.len()
        );
        Ok(dispatched.snapshot)
    }

    pub fn add_product(&self, draft: ProductDraft) -> Result<Product, ServiceError> {
        let dispatched = self.dispatch(CatalogAction::Add(draft))?;
        committed_product(&dispatched)
    }

    pub fn update_product(&self, product: Product) -> Result<Product, ServiceError> {
        let dispatched = self.dispatch(CatalogAction::Update(product))?;
        committed_product(&dispatched)
    }

    pub fn delete_product(&self, id: u64) -> Result<Arc<CatalogSnapshot>, ServiceError> {
        Ok(self.dispatch(CatalogAction::Delete(id))?.snapshot)
    }

    fn publish(&self, snapshot: &CatalogSnapshot, effect: Effect) {
        let Some(events) = &self.events else {
            return;
        };
        let version = snapshot.version;
        let stock_of = |id: u64| snapshot.product(id).map(|p| p.stock).unwrap_or(0);

        let event = match effect {
            Effect::Loaded => CatalogEvent::CatalogLoaded {
                version,
                products: snapshot.catalog.len(),
            },
            Effect::Added(product_id) => CatalogEvent::ProductAdded {
                version,
                product_id,
            },
            Effect::Updated(product_id) => CatalogEvent::ProductUpdated {
                version,
                product_id,
                stock: stock_of(product_id),
            },
            Effect::Deleted(product_id) => CatalogEvent::ProductDeleted {
                version,
                product_id,
            },
            Effect::Fed(product_id) => CatalogEvent::FeedApplied {
                version,
                product_id,
                stock: stock_of(product_id),
                at: snapshot
                    .product(product_id)
                    .map(|p| p.last_updated)
                    .unwrap_or_else(Utc::now),
            },
        };
        events.publish(event);
    }
}

fn committed_product(dispatched: &Dispatched) -> Result<Product, ServiceError> {
    dispatched
        .effect
        .and_then(Effect::product_id)
        .and_then(|id| dispatched.snapshot.product(id))
        .cloned()
        .ok_or_else(|| ServiceError::InternalError("committed product missing".to_string()))
}

/// Demo catalog shown when no external store delivers one.
pub fn seed_catalog(now: DateTime<Utc>) -> Vec<Product> {
    let product = |id: u64, name: &str, price, stock, category: &str, sales: [u32; 6]| Product {
        id,
        name: name.to_string(),
        description: None,
        price,
        stock,
        category: category.to_string(),
        image_url: format!("https://picsum.photos/300/200?random={}", id),
        sales_data: sales.to_vec(),
        last_updated: now,
    };

    vec![
        product(1, "Premium Laptop", dec!(1299.99), 45, "electronics", [12, 15, 18, 22, 25, 28]),
        product(2, "Wireless Headphones", dec!(199.99), 120, "electronics", [45, 38, 42, 50, 55, 60]),
        product(3, "Running Shoes", dec!(89.99), 75, "clothing", [30, 25, 28, 32, 35, 40]),
        product(4, "Smart Watch", dec!(349.99), 30, "electronics", [18, 22, 25, 28, 32, 35]),
        product(5, "Yoga Mat", dec!(49.99), 200, "sports", [15, 20, 25, 30, 35, 40]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryFilter, Trend};

    fn settings() -> CatalogSettings {
        CatalogSettings::default()
    }

    fn seeded() -> CatalogSnapshot {
        CatalogSnapshot::commit(1, seed_catalog(Utc::now()))
    }

    #[test]
    fn commit_pairs_predictions_with_catalog() {
        let snap = seeded();
        let ids: Vec<u64> = snap.catalog().iter().map(|p| p.id).collect();
        let predicted: Vec<u64> = snap.predictions().iter().map(|p| p.product_id).collect();
        assert_eq!(ids, predicted);
        assert_eq!(snap.prediction(1).unwrap().current_trend, Trend::Rising);
    }

    #[test]
    fn add_assigns_next_id() {
        let snap = seeded();
        let change = reduce(
            &snap,
            CatalogAction::Add(ProductDraft::new("Desk", dec!(10))),
            &settings(),
            Utc::now(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(change.effect, Effect::Added(6));
        assert_eq!(change.catalog.len(), 6);
        assert_eq!(change.catalog[5].sales_data, vec![0; 6]);
        assert_eq!(change.catalog[5].category, "general");
    }

    #[test]
    fn add_to_empty_catalog_starts_at_one() {
        let change = reduce(
            &CatalogSnapshot::default(),
            CatalogAction::Add(ProductDraft::new("Desk", dec!(10))),
            &settings(),
            Utc::now(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(change.effect, Effect::Added(1));
    }

    #[test]
    fn rejected_add_changes_nothing() {
        let snap = seeded();
        let err = reduce(
            &snap,
            CatalogAction::Add(ProductDraft::new("", dec!(10))),
            &settings(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn update_must_keep_window_length() {
        let snap = seeded();
        let mut p = snap.product(2).unwrap().clone();
        p.sales_data.push(70);
        let err = reduce(&snap, CatalogAction::Update(p), &settings(), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn update_unknown_product_is_not_found() {
        let snap = seeded();
        let mut p = snap.product(2).unwrap().clone();
        p.id = 99;
        let err = reduce(&snap, CatalogAction::Update(p), &settings(), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let mut products = seed_catalog(Utc::now());
        products[1].id = 1;
        let err = reduce(
            &CatalogSnapshot::default(),
            CatalogAction::Load(products),
            &settings(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn add_after_largest_id_is_rejected() {
        let mut products = seed_catalog(Utc::now());
        products[0].id = u64::MAX;
        let snap = CatalogSnapshot::commit(1, products);

        let err = reduce(
            &snap,
            CatalogAction::Add(ProductDraft::new("Desk", dec!(10))),
            &settings(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn feed_tick_on_empty_sales_window_keeps_it_empty() {
        let mut products = seed_catalog(Utc::now());
        products.truncate(1);
        products[0].sales_data.clear();
        let snap = CatalogSnapshot::commit(1, products);

        let tick = FeedTick {
            pick: 0.0,
            decrement_stock: false,
            sale: Some(4),
            at: Utc::now(),
        };
        let change = reduce(&snap, CatalogAction::FeedTick(tick), &settings(), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(change.effect, Effect::Fed(1));
        assert!(change.catalog[0].sales_data.is_empty());
        assert_eq!(change.catalog[0].stock, 45);
    }

    #[test]
    fn filtered_predictions_follow_filtered_products() {
        let snap = seeded();
        let view = snap.filtered(&ViewFilter::new("", CategoryFilter::parse("clothing")));
        assert_eq!(view.products.len(), 1);
        assert_eq!(view.products[0].id, 3);
        assert_eq!(view.predictions.len(), 1);
        assert_eq!(view.predictions[0].product_id, 3);

        let view = snap.filtered(&ViewFilter::new("WATCH", CategoryFilter::All));
        assert_eq!(view.products.iter().map(|p| p.id).collect::<Vec<_>>(), vec![4]);
        assert_eq!(
            view.predictions.iter().map(|p| p.product_id).collect::<Vec<_>>(),
            vec![4]
        );
    }

    #[test]
    fn categories_include_extras_once() {
        let mut products = seed_catalog(Utc::now());
        products[0].category = "office".into();
        products[1].category = "office".into();
        let snap = CatalogSnapshot::commit(1, products);
        assert_eq!(
            snap.categories(),
            vec!["electronics", "clothing", "sports", "general", "office"]
        );
    }

    #[test]
    fn trend_series_is_time_aligned() {
        let snap = seeded();
        let series = snap.trend_series(1).unwrap();
        assert_eq!(series.actual, vec![12, 15, 18, 22, 25, 28]);
        assert_eq!(series.predicted, vec![31, 34, 37]);
        assert_eq!(series.forecast_start, 6);
        assert_eq!(series.labels.len(), 9);

        let (actual, predicted) = series.aligned();
        assert_eq!(actual[5], Some(28));
        assert_eq!(actual[6], None);
        assert_eq!(predicted[5], None);
        assert_eq!(predicted[6], Some(31));
        assert!(snap.trend_series(42).is_none());
    }
}
