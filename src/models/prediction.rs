use serde::{Deserialize, Serialize};
use std::fmt;

use super::product::Product;

/// Direction of recent sales compared with the preceding periods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        };
        f.write_str(label)
    }
}

/// Forecast derived from one product's sales window. Has no identity of its
/// own beyond `product_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendPrediction {
    pub product_id: u64,
    pub product_name: String,
    pub current_trend: Trend,
    pub confidence: f64,
    pub predicted_sales: Vec<u32>,
}

/// Actual and predicted sales laid out on one time axis for charting.
///
/// `predicted[k]` belongs to period `forecast_start + k`, i.e. the forecast
/// starts right after the last observed period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub product_id: u64,
    pub labels: Vec<String>,
    pub actual: Vec<u32>,
    pub predicted: Vec<u32>,
    pub forecast_start: usize,
}

impl TrendSeries {
    pub fn new(product: &Product, prediction: &TrendPrediction) -> Self {
        let actual = product.sales_data.clone();
        let predicted = prediction.predicted_sales.clone();
        Self {
            product_id: product.id,
            labels: period_labels(actual.len(), predicted.len()),
            forecast_start: actual.len(),
            actual,
            predicted,
        }
    }

    /// Both series padded with `None` to the full axis length.
    pub fn aligned(&self) -> (Vec<Option<u32>>, Vec<Option<u32>>) {
        let actual = self
            .actual
            .iter()
            .copied()
            .map(Some)
            .chain(std::iter::repeat(None).take(self.predicted.len()))
            .collect();
        let predicted = std::iter::repeat(None)
            .take(self.forecast_start)
            .chain(self.predicted.iter().copied().map(Some))
            .collect();
        (actual, predicted)
    }
}

fn period_labels(window: usize, horizon: usize) -> Vec<String> {
    let past = (0..window).map(|i| {
        let age = window - 1 - i;
        if age == 0 {
            "Current".to_string()
        } else {
            format!("Week -{}", age)
        }
    });
    let future = (1..=horizon).map(|k| {
        if k == 1 {
            "Next Week".to_string()
        } else {
            format!("Week +{}", k)
        }
    });
    past.chain(future).collect()
}
