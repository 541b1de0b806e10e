use serde::{Deserialize, Serialize};

use super::prediction::TrendPrediction;
use super::product::Product;

/// Categories offered by the dashboard's pickers. Products may carry others.
pub const KNOWN_CATEGORIES: [&str; 4] = ["electronics", "clothing", "sports", "general"];

/// Wildcard accepted by [`CategoryFilter::parse`].
pub const ALL_CATEGORIES: &str = "all";

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// `"all"` (any case) or an empty selector means no category restriction.
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if selector.is_empty() || selector.eq_ignore_ascii_case(ALL_CATEGORIES) {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(selector.to_string())
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }
}

/// Search term plus category selector applied to the catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewFilter {
    needle: String,
    pub category: CategoryFilter,
}

impl ViewFilter {
    pub fn new(search: &str, category: CategoryFilter) -> Self {
        Self {
            needle: search.to_lowercase(),
            category,
        }
    }

    pub fn search(&self) -> &str {
        &self.needle
    }

    /// Case-insensitive name substring AND category match.
    pub fn matches(&self, product: &Product) -> bool {
        product.name.to_lowercase().contains(&self.needle)
            && self.category.matches(&product.category)
    }
}

/// Filtered products and exactly the predictions that belong to them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilteredView {
    pub products: Vec<Product>,
    pub predictions: Vec<TrendPrediction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }
}

/// Everything the presentation layer reads in one consistent piece.
#[derive(Clone, Debug, Serialize)]
pub struct DashboardView {
    pub version: u64,
    pub catalog: Vec<Product>,
    pub predictions: Vec<TrendPrediction>,
    pub filtered_catalog: Vec<Product>,
    pub filtered_predictions: Vec<TrendPrediction>,
    pub connection_status: ConnectionStatus,
}
