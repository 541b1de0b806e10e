//! Property-based tests for the forecast engine and catalog invariants.
//!
//! These tests use proptest to check that predictions always mirror the
//! catalog and that live-feed mutations keep every product well formed.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use stockpulse::{
    config::{CatalogSettings, FeedSettings},
    models::{CategoryFilter, Product, Trend, ViewFilter},
    services::{
        catalog::{CatalogAction, CatalogStore},
        forecasting::{self, FORECAST_HORIZON, MAX_CONFIDENCE},
        live_feed::TickSource,
    },
};

// Strategies for generating test data
fn sales_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..500, 0..12)
}

fn category_strategy() -> impl Strategy<Value = String> {
    prop_oneof!["electronics", "clothing", "sports", "general"].prop_map(String::from)
}

fn catalog_strategy() -> impl Strategy<Value = Vec<Product>> {
    prop::collection::vec(
        ("[A-Za-z ]{1,16}", 0u32..200, category_strategy(), prop::collection::vec(0u32..100, 6)),
        0..20,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, stock, category, sales_data))| Product {
                id: i as u64 + 1,
                name: format!("P{} {}", i, name),
                description: None,
                price: Decimal::new(999, 2),
                stock,
                category,
                image_url: String::new(),
                sales_data,
                last_updated: Utc::now(),
            })
            .collect()
    })
}

fn product_with_sales(sales_data: Vec<u32>) -> Product {
    Product {
        id: 1,
        name: "Widget".to_string(),
        description: None,
        price: Decimal::ONE,
        stock: 1,
        category: "general".to_string(),
        image_url: String::new(),
        sales_data,
        last_updated: Utc::now(),
    }
}

// Property: a prediction is always well formed
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn confidence_and_horizon_are_bounded(sales in sales_strategy()) {
        let prediction = forecasting::predict(&product_with_sales(sales));
        prop_assert!((0.0..=MAX_CONFIDENCE).contains(&prediction.confidence));
        prop_assert_eq!(prediction.predicted_sales.len(), FORECAST_HORIZON);
        if prediction.current_trend == Trend::Stable {
            prop_assert_eq!(prediction.confidence, 0.5);
        }
    }

    #[test]
    fn forecasting_is_deterministic(sales in sales_strategy()) {
        let product = product_with_sales(sales);
        prop_assert_eq!(forecasting::predict(&product), forecasting::predict(&product));
    }
}

// Property: predictions mirror the catalog one-to-one
proptest! {
    #[test]
    fn prediction_ids_match_catalog_ids(catalog in catalog_strategy()) {
        let predictions = forecasting::forecast(&catalog);
        let catalog_ids: Vec<u64> = catalog.iter().map(|p| p.id).collect();
        let prediction_ids: Vec<u64> = predictions.iter().map(|p| p.product_id).collect();
        prop_assert_eq!(catalog_ids, prediction_ids);
    }

    #[test]
    fn filtered_predictions_match_filtered_products(
        catalog in catalog_strategy(),
        search in "[a-z]{0,2}",
        category in prop_oneof![Just("all".to_string()), category_strategy()],
    ) {
        let store = CatalogStore::new(CatalogSettings::default());
        store.load(catalog).unwrap();

        let view = store
            .snapshot()
            .filtered(&ViewFilter::new(&search, CategoryFilter::parse(&category)));
        let product_ids: Vec<u64> = view.products.iter().map(|p| p.id).collect();
        let prediction_ids: Vec<u64> = view.predictions.iter().map(|p| p.product_id).collect();
        prop_assert_eq!(product_ids, prediction_ids);
    }
}

// Property: feed mutations never break a product
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn feed_ticks_keep_products_well_formed(
        catalog in catalog_strategy(),
        seed in any::<u64>(),
        ticks in 1usize..200,
    ) {
        let store = CatalogStore::new(CatalogSettings::default());
        store.load(catalog.clone()).unwrap();

        let settings = FeedSettings {
            stock_decrement_probability: 0.9,
            sales_update_probability: 0.9,
            ..FeedSettings::default()
        };
        let mut source = TickSource::seeded(seed);
        for _ in 0..ticks {
            store
                .dispatch(CatalogAction::FeedTick(source.draw(&settings, Utc::now())))
                .unwrap();
        }

        let snapshot = store.snapshot();
        prop_assert_eq!(snapshot.catalog().len(), catalog.len());
        for (before, after) in catalog.iter().zip(snapshot.catalog()) {
            prop_assert_eq!(before.id, after.id);
            prop_assert!(after.stock <= before.stock);
            prop_assert_eq!(after.sales_data.len(), before.sales_data.len());
            prop_assert!(after
                .sales_data
                .iter()
                .all(|s| before.sales_data.contains(s)
                    || (settings.sample_min..=settings.sample_max).contains(s)));
        }
        prop_assert_eq!(snapshot.predictions().len(), catalog.len());
    }
}
