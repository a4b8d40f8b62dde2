//! Fixed-length feature vectors for the predictor.
//!
//! The predictor was trained on exactly 30 features: fifteen statistics of the
//! value sub-series (indices 0..15) followed by the same fifteen statistics of
//! the time sub-series (indices 15..30). The order below is a wire contract.

use std::ops::Range;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::AnalysisError;
use crate::series::OptimizedSeries;

pub const FEATURE_COUNT: usize = 30;
pub const STATISTICS_PER_SERIES: usize = 15;

/// Fewer samples than this cannot produce meaningful statistics.
pub const MIN_FEATURE_SAMPLES: usize = 10;

const MIN_REGION_SAMPLES: usize = 50;
const MAX_REGION_SAMPLES: usize = 1500;
const REGION_FRACTION: f64 = 0.01;
const MIN_REGION_THRESHOLD: f64 = 0.01;
const REGION_LEAD_IN: usize = 10;

/// Exactly [`FEATURE_COUNT`] values. Serializes as a flat JSON array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Builds a vector from arbitrary length input, zero-padding or truncating
    /// at the end so existing indices keep their meaning.
    pub fn from_values(values: &[f64]) -> Self {
        let mut features = [0.0; FEATURE_COUNT];
        for (slot, value) in features.iter_mut().zip(values) {
            *slot = *value;
        }
        Self(features)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn value_statistics(&self) -> &[f64] {
        &self.0[..STATISTICS_PER_SERIES]
    }

    pub fn time_statistics(&self) -> &[f64] {
        &self.0[STATISTICS_PER_SERIES..]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}

/// Extracts the predictor features from an optimized series.
pub fn extract_features(
    series: &OptimizedSeries,
    input_voltage: f64,
) -> Result<FeatureVector, AnalysisError> {
    let samples = series.time.len().min(series.output.len());
    if samples < MIN_FEATURE_SAMPLES {
        return Err(AnalysisError::InsufficientData { samples });
    }

    let region = detect_useful_region(&series.output[..samples], input_voltage);
    let values = &series.output[region.clone()];
    let times = &series.time[region.clone()];

    debug!(
        start = region.start,
        end = region.end,
        points = values.len(),
        "Useful region selected for features"
    );

    let mut features = Vec::with_capacity(FEATURE_COUNT);
    features.extend(statistics_block(values));
    features.extend(statistics_block(times));

    Ok(FeatureVector::from_values(&features))
}

/// Half-open range of the samples worth describing.
///
/// Starts ten samples before the first value that departs from the initial
/// value by more than `max(1% of |V|, 0.01)` and spans at most 1500 samples.
/// The final sample is always excluded.
pub fn detect_useful_region(values: &[f64], input_voltage: f64) -> Range<usize> {
    let last = values.len().saturating_sub(1);
    if values.len() < MIN_REGION_SAMPLES {
        return 0..last;
    }

    let threshold = (input_voltage.abs() * REGION_FRACTION).max(MIN_REGION_THRESHOLD);
    let start = values
        .iter()
        .skip(1)
        .position(|value| (value - values[0]).abs() > threshold)
        .map(|offset| (offset + 1).saturating_sub(REGION_LEAD_IN))
        .unwrap_or(0);

    let span = MAX_REGION_SAMPLES.min(values.len());
    let end = if last - start > span { start + span } else { last };

    start..end
}

fn statistics_block(data: &[f64]) -> [f64; STATISTICS_PER_SERIES] {
    let diffs = differences(data);
    let min = min(data);
    let max = max(data);

    [
        mean(data),
        std_dev(data),
        min,
        max,
        median(data),
        percentile(data, 25.0),
        percentile(data, 75.0),
        sum_abs(&diffs),
        max_abs(&diffs),
        mean_abs(&diffs),
        count_extrema(&diffs) as f64,
        std_dev(&diffs),
        max - min,
        energy(data),
        mean_abs(data),
    ]
}

pub(crate) fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation.
fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = mean(data);
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

fn min(data: &[f64]) -> f64 {
    data.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub(crate) fn max(data: &[f64]) -> f64 {
    data.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

fn sorted(data: &[f64]) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sorted = sorted(data);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile: `sorted[ceil(n × p / 100) − 1]`, clamped.
fn percentile(data: &[f64], p: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sorted = sorted(data);
    let rank = (sorted.len() as f64 * p / 100.0).ceil() as isize - 1;
    let index = rank.clamp(0, sorted.len() as isize - 1) as usize;
    sorted[index]
}

fn differences(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn sum_abs(data: &[f64]) -> f64 {
    data.iter().map(|v| v.abs()).sum()
}

fn max_abs(data: &[f64]) -> f64 {
    data.iter().map(|v| v.abs()).reduce(f64::max).unwrap_or(0.0)
}

fn mean_abs(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    sum_abs(data) / data.len() as f64
}

/// Strict local maxima plus strict local minima.
fn count_extrema(data: &[f64]) -> usize {
    data.windows(3)
        .filter(|w| (w[1] > w[0] && w[1] > w[2]) || (w[1] < w[0] && w[1] < w[2]))
        .count()
}

/// Mean of squares.
fn energy(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().map(|v| v * v).sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: Vec<f64>, period: f64) -> OptimizedSeries {
        OptimizedSeries {
            time: (0..values.len()).map(|i| i as f64 * period).collect(),
            output: values,
        }
    }

    #[test]
    fn ten_samples_yield_thirty_features() {
        let s = series((0..10).map(|i| i as f64).collect(), 0.001);
        let features = extract_features(&s, 5.0).unwrap();
        assert_eq!(features.as_slice().len(), FEATURE_COUNT);
        assert_eq!(features.value_statistics().len(), STATISTICS_PER_SERIES);
        assert_eq!(features.time_statistics().len(), STATISTICS_PER_SERIES);
    }

    #[test]
    fn fewer_than_ten_samples_is_insufficient() {
        let s = series(vec![1.0; 9], 0.001);
        assert!(matches!(
            extract_features(&s, 5.0),
            Err(AnalysisError::InsufficientData { samples: 9 })
        ));
    }

    #[test]
    fn value_block_follows_statistic_order() {
        // Short series: region is everything but the final sample.
        let s = series(vec![1.0, 3.0, 2.0, 4.0, 0.0, 5.0, 1.0, 2.0, 3.0, 4.0, 99.0], 1.0);
        let features = extract_features(&s, 1.0).unwrap();
        let v = features.value_statistics();

        assert_eq!(v[0], 2.5); // mean of the first ten
        assert_eq!(v[2], 0.0); // min
        assert_eq!(v[3], 5.0); // max
        assert_eq!(v[4], 2.5); // median of even count
        assert_eq!(v[5], 1.0); // p25: sorted[ceil(2.5) - 1]
        assert_eq!(v[6], 4.0); // p75: sorted[ceil(7.5) - 1]
        assert_eq!(v[7], 2.0 + 1.0 + 2.0 + 4.0 + 5.0 + 4.0 + 1.0 + 1.0 + 1.0);
        assert_eq!(v[8], 5.0);
        assert_eq!(v[12], 5.0);
        assert_eq!(v[14], 2.5);
    }

    #[test]
    fn time_block_describes_uniform_grid() {
        let s = series(vec![0.0; 20], 0.5);
        let features = extract_features(&s, 5.0).unwrap();
        let t = features.time_statistics();

        assert_eq!(t[2], 0.0); // min
        assert_eq!(t[3], 9.0); // max of indices 0..19 times 0.5
        assert_eq!(t[8], 0.5); // constant step
        assert_eq!(t[10], 0.0); // no extrema in constant differences
        assert_eq!(t[11], 0.0);
    }

    #[test]
    fn count_extrema_counts_peaks_and_troughs() {
        assert_eq!(count_extrema(&[0.0, 1.0, 0.0, 1.0, 0.0]), 3);
        assert_eq!(count_extrema(&[0.0, 1.0, 1.0, 0.0]), 0);
        assert_eq!(count_extrema(&[1.0, 2.0]), 0);
    }

    #[test]
    fn useful_region_skips_flat_lead_in() {
        let mut values = vec![0.0; 100];
        for value in values.iter_mut().skip(40) {
            *value = 3.0;
        }
        assert_eq!(detect_useful_region(&values, 3.0), 30..99);
    }

    #[test]
    fn useful_region_is_capped() {
        let values: Vec<f64> = (0..4000).map(|i| i as f64).collect();
        let region = detect_useful_region(&values, 1.0);
        assert_eq!(region, 0..1500);
    }

    #[test]
    fn from_values_pads_and_truncates() {
        let short = FeatureVector::from_values(&[1.0, 2.0]);
        assert_eq!(short.as_slice()[1], 2.0);
        assert_eq!(short.as_slice()[29], 0.0);

        let long: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let truncated = FeatureVector::from_values(&long);
        assert_eq!(truncated.as_slice()[29], 29.0);
    }

    #[test]
    fn serializes_as_flat_array() {
        let json = serde_json::to_value(FeatureVector::from_values(&[1.5])).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(FEATURE_COUNT));
        assert_eq!(json[0], 1.5);
    }
}
