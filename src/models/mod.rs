// Catalog entries
pub mod product;

// Derived forecasts and chart series
pub mod prediction;

// Read-side shapes for the presentation layer
pub mod view;

pub use prediction::{Trend, TrendPrediction, TrendSeries};
pub use product::{Product, ProductDraft};
pub use view::{
    CategoryFilter, ConnectionStatus, DashboardView, FilteredView, ViewFilter, KNOWN_CATEGORIES,
};
