/*!
 * # Sales Trend Forecasting
 *
 * Pure functions that turn a product's rolling sales window into a trend
 * classification, a confidence score and a short linear projection.
 *
 * - "recent" is the last three observations (left-padded with zeros when the
 *   window is shorter), "previous" the three before them, or zeros when the
 *   window holds fewer than six points.
 * - A zero previous average carries no signal and yields `Stable` / 0.5.
 * - The projection extends the secant through the first and last recent
 *   points, rounds to whole units and never goes below zero.
 */

use crate::models::{Product, Trend, TrendPrediction};

/// Number of future periods in every forecast
pub const FORECAST_HORIZON: usize = 3;

/// Upper bound for a rising or falling confidence score
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Confidence reported for stable (or signal-less) products
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

const SEGMENT: usize = 3;
const RISE_FACTOR: f64 = 1.2;
const FALL_FACTOR: f64 = 0.8;

/// One prediction per product, same order, same ids.
pub fn forecast(catalog: &[Product]) -> Vec<TrendPrediction> {
    catalog.iter().map(predict).collect()
}

pub fn predict(product: &Product) -> TrendPrediction {
    let recent = recent_segment(&product.sales_data);
    let previous = previous_segment(&product.sales_data);

    let (current_trend, confidence) = classify(mean(&recent), mean(&previous));

    TrendPrediction {
        product_id: product.id,
        product_name: product.name.clone(),
        current_trend,
        confidence,
        predicted_sales: project(&recent),
    }
}

/// Compares the two averages. Rising needs more than +20%, falling more
/// than -20%; anything in between is stable.
pub fn classify(recent_avg: f64, previous_avg: f64) -> (Trend, f64) {
    if previous_avg <= 0.0 {
        return (Trend::Stable, NEUTRAL_CONFIDENCE);
    }

    if recent_avg > previous_avg * RISE_FACTOR {
        let confidence = (recent_avg - previous_avg) / previous_avg;
        (Trend::Rising, confidence.min(MAX_CONFIDENCE))
    } else if recent_avg < previous_avg * FALL_FACTOR {
        let confidence = (previous_avg - recent_avg) / previous_avg;
        (Trend::Falling, confidence.min(MAX_CONFIDENCE))
    } else {
        (Trend::Stable, NEUTRAL_CONFIDENCE)
    }
}

fn project(recent: &[f64; SEGMENT]) -> Vec<u32> {
    let last = recent[SEGMENT - 1];
    let slope = (last - recent[0]) / 2.0;

    (1..=FORECAST_HORIZON)
        // Projections saturate at u32::MAX rather than wrap.
        .map(|k| (last + slope * k as f64).round().clamp(0.0, f64::from(u32::MAX)) as u32)
        .collect()
}

fn recent_segment(sales: &[u32]) -> [f64; SEGMENT] {
    let mut segment = [0.0; SEGMENT];
    let take = sales.len().min(SEGMENT);
    let source = &sales[sales.len() - take..];
    for (slot, value) in segment[SEGMENT - take..].iter_mut().zip(source) {
        *slot = f64::from(*value);
    }
    segment
}

fn previous_segment(sales: &[u32]) -> [f64; SEGMENT] {
    let mut segment = [0.0; SEGMENT];
    if sales.len() < 2 * SEGMENT {
        return segment;
    }
    let end = sales.len() - SEGMENT;
    for (slot, value) in segment.iter_mut().zip(&sales[end - SEGMENT..end]) {
        *slot = f64::from(*value);
    }
    segment
}

fn mean(values: &[f64; SEGMENT]) -> f64 {
    values.iter().sum::<f64>() / SEGMENT as f64
}
