//! NaN-aware descriptive statistics.

use serde::Serialize;

/// Finite values of a slice, widened to f64.
pub fn finite_values(values: &[f32]) -> Vec<f64> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::max)
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NAN, f64::min)
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// How steady a power resource is over time.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyMetrics {
    pub std_deviation: f64,
    pub coefficient_of_variation: f64,
    pub percent_above_threshold: f64,
    pub threshold_value: f64,
    pub mean_power: f64,
    pub median_power: f64,
}

impl ConsistencyMetrics {
    fn undefined() -> Self {
        Self {
            std_deviation: f64::NAN,
            coefficient_of_variation: f64::NAN,
            percent_above_threshold: f64::NAN,
            threshold_value: f64::NAN,
            mean_power: f64::NAN,
            median_power: f64::NAN,
        }
    }
}

/// Consistency metrics for a power series; NaN entries are ignored.
pub fn consistency_metrics(values: &[f32], threshold_percentile: f64) -> ConsistencyMetrics {
    let clean = finite_values(values);
    if clean.is_empty() {
        return ConsistencyMetrics::undefined();
    }

    let threshold = percentile(&clean, threshold_percentile);
    let m = mean(&clean);
    let sd = std_dev(&clean);
    let above = clean.iter().filter(|&&v| v > threshold).count();

    ConsistencyMetrics {
        std_deviation: sd,
        coefficient_of_variation: if m > 0.0 { sd / m } else { f64::NAN },
        percent_above_threshold: above as f64 / clean.len() as f64 * 100.0,
        threshold_value: threshold,
        mean_power: m,
        median_power: median(&clean),
    }
}
