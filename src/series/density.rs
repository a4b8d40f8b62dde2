//! Windowing plus shape-preserving downsampling.

use tracing::debug;

use super::{OptimizedSeries, RawSeries, Window, detect_window};

/// Bounded-budget downsampler.
///
/// Keeps the first and last points, a uniform stride in between, and any point
/// where the slope changes by more than `slope_threshold` so that corners and
/// overshoot peaks survive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityReducer {
    max_points: usize,
    slope_threshold: f64,
}

impl DensityReducer {
    pub const DEFAULT_MAX_POINTS: usize = 300;
    pub const DEFAULT_SLOPE_THRESHOLD: f64 = 0.1;
    /// First, last and at least one interior point.
    pub const MIN_MAX_POINTS: usize = 3;

    pub fn new(max_points: usize, slope_threshold: f64) -> Self {
        Self {
            max_points: max_points.max(Self::MIN_MAX_POINTS),
            slope_threshold,
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn slope_threshold(&self) -> f64 {
        self.slope_threshold
    }

    /// Downsamples `(time, values)` to at most `max_points` points.
    pub fn reduce(&self, time: &[f64], values: &[f64]) -> OptimizedSeries {
        let len = time.len().min(values.len());
        if len <= self.max_points {
            return OptimizedSeries {
                time: time[..len].to_vec(),
                output: values[..len].to_vec(),
            };
        }

        let mut reduced = OptimizedSeries {
            time: Vec::with_capacity(self.max_points),
            output: Vec::with_capacity(self.max_points),
        };
        reduced.time.push(time[0]);
        reduced.output.push(values[0]);

        let stride = len as f64 / (self.max_points - 2) as f64;
        for i in 1..len - 1 {
            let on_stride = i as f64 >= reduced.len() as f64 * stride;
            let previous_slope = values[i] - values[i - 1];
            let next_slope = values[i + 1] - values[i];
            let on_corner = (next_slope - previous_slope).abs() > self.slope_threshold;

            if on_stride || on_corner {
                reduced.time.push(time[i]);
                reduced.output.push(values[i]);
            }

            if reduced.len() >= self.max_points - 1 {
                break;
            }
        }

        reduced.time.push(time[len - 1]);
        reduced.output.push(values[len - 1]);
        reduced
    }
}

impl Default for DensityReducer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_POINTS, Self::DEFAULT_SLOPE_THRESHOLD)
    }
}

/// Windows `series`, re-bases its time axis to `i × sampling_period` and
/// downsamples the result.
///
/// `series` must be non-empty.
pub fn optimize(
    series: &RawSeries,
    input_voltage: f64,
    reducer: &DensityReducer,
) -> (Window, OptimizedSeries) {
    let values = series.values();
    let window = detect_window(&values, input_voltage);
    let period = series.meta.sampling_period;

    let windowed = &values[window.start..=window.end];
    let rebased: Vec<f64> = (0..windowed.len()).map(|i| i as f64 * period).collect();

    debug!(
        start = window.start,
        end = window.end,
        total = series.len(),
        "Transient window detected"
    );

    (window, reducer.reduce(&rebased, windowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{RawSample, SeriesMeta};

    fn ramp(len: usize) -> (Vec<f64>, Vec<f64>) {
        let time = (0..len).map(|i| i as f64 * 0.001).collect();
        let values = (0..len).map(|i| i as f64 * 0.01).collect();
        (time, values)
    }

    #[test]
    fn short_series_is_untouched() {
        let (time, values) = ramp(120);
        let reduced = DensityReducer::default().reduce(&time, &values);
        assert_eq!(reduced.time, time);
        assert_eq!(reduced.output, values);
    }

    #[test]
    fn long_series_respects_budget_and_endpoints() {
        let (time, values) = ramp(5000);
        for budget in [3usize, 10, 300] {
            let reduced = DensityReducer::new(budget, 0.1).reduce(&time, &values);
            assert!(reduced.len() <= budget, "{} > {budget}", reduced.len());
            assert_eq!(reduced.first(), Some((time[0], values[0])));
            assert_eq!(reduced.last(), Some((time[4999], values[4999])));
        }
    }

    #[test]
    fn corners_are_preserved() {
        let len = 2000;
        let time: Vec<f64> = (0..len).map(|i| i as f64).collect();
        let mut values = vec![0.0; len];
        values[1001] = 5.0;
        let reduced = DensityReducer::new(50, 0.1).reduce(&time, &values);
        assert!(reduced.output.contains(&5.0));
    }

    #[test]
    fn budget_below_minimum_is_raised() {
        assert_eq!(DensityReducer::new(1, 0.1).max_points(), 3);
    }

    #[test]
    fn optimize_rebases_time_to_uniform_grid() {
        let samples = (0..400)
            .map(|i| RawSample {
                time: 10.0 + i as f64 * 0.003,
                value: if i < 100 { 0.0 } else { 2.0 },
            })
            .collect();
        let series = RawSeries {
            samples,
            meta: SeriesMeta {
                sampling_period: 0.002,
                ..SeriesMeta::default()
            },
        };

        let (window, optimized) = optimize(&series, 2.0, &DensityReducer::default());
        assert!(window.start <= window.end);
        assert_eq!(optimized.time[0], 0.0);
        let expected_last = (window.sample_count() - 1) as f64 * 0.002;
        assert!((optimized.last().unwrap().0 - expected_last).abs() < 1e-9);
        for t in &optimized.time {
            let steps = t / 0.002;
            assert!((steps - steps.round()).abs() < 1e-6);
        }
        assert!(optimized.len() <= 300);
    }
}
