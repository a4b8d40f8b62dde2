//! Classical step-response performance metrics.

use serde::{Deserialize, Serialize};

use crate::features::{max, mean};
use crate::series::OptimizedSeries;

const SETTLING_TARGET: f64 = 0.95;
const SETTLING_BAND: f64 = 0.05;
const RISE_LOW: f64 = 0.1;
const RISE_HIGH: f64 = 0.9;
const STEADY_STATE_FRACTION: f64 = 0.9;

/// Overshoot and error are percentages of `|V|`; times are in seconds on the
/// optimized time axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub max_overshoot: f64,
    pub settling_time: f64,
    pub rise_time: f64,
    pub steady_state_error: f64,
}

impl PerformanceMetrics {
    pub fn compute(series: &OptimizedSeries, input_voltage: f64) -> Self {
        let len = series.time.len().min(series.output.len());
        let time = &series.time[..len];
        let output = &series.output[..len];

        Self {
            max_overshoot: max_overshoot(output, input_voltage),
            settling_time: settling_time(time, output, input_voltage),
            rise_time: rise_time(time, output, input_voltage),
            steady_state_error: steady_state_error(output, input_voltage),
        }
    }
}

/// `max(0, (peak − V) / |V| × 100)`; zero for a zero input.
pub fn max_overshoot(output: &[f64], input_voltage: f64) -> f64 {
    if input_voltage == 0.0 || output.is_empty() {
        return 0.0;
    }
    ((max(output) - input_voltage) / input_voltage.abs() * 100.0).max(0.0)
}

/// Time just after the last excursion outside `0.95·V ± 0.05·|V|`.
///
/// An excursion at the very last sample is ignored. Returns the final
/// timestamp when the response never leaves the band.
pub fn settling_time(time: &[f64], output: &[f64], input_voltage: f64) -> f64 {
    let target = input_voltage * SETTLING_TARGET;
    let tolerance = input_voltage.abs() * SETTLING_BAND;

    let last_excursion = output
        .iter()
        .enumerate()
        .rev()
        .skip(1)
        .find(|(_, value)| (*value - target).abs() > tolerance)
        .map(|(i, _)| i);

    match last_excursion {
        Some(i) => time[i + 1],
        None => time.last().copied().unwrap_or(0.0),
    }
}

/// Time from the first sample at or above `0.1·V` to the first at or above `0.9·V`.
pub fn rise_time(time: &[f64], output: &[f64], input_voltage: f64) -> f64 {
    let low = input_voltage * RISE_LOW;
    let high = input_voltage * RISE_HIGH;

    let mut low_time = None;
    for (t, value) in time.iter().zip(output) {
        if low_time.is_none() && *value >= low {
            low_time = Some(*t);
        }
        if *value >= high {
            return low_time.map(|low_time| t - low_time).unwrap_or(0.0);
        }
    }

    0.0
}

/// `|V − mean(last 10%)| / |V| × 100`; zero for a zero input.
pub fn steady_state_error(output: &[f64], input_voltage: f64) -> f64 {
    if output.is_empty() || input_voltage == 0.0 {
        return 0.0;
    }
    let start = ((output.len() as f64 * STEADY_STATE_FRACTION) as usize).min(output.len() - 1);
    let steady = mean(&output[start..]);
    (input_voltage - steady).abs() / input_voltage.abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(output: Vec<f64>, period: f64) -> OptimizedSeries {
        OptimizedSeries {
            time: (0..output.len()).map(|i| i as f64 * period).collect(),
            output,
        }
    }

    #[test]
    fn overshoot_is_relative_to_input() {
        assert_eq!(max_overshoot(&[0.0, 6.0, 5.0], 5.0), 20.0);
        assert_eq!(max_overshoot(&[0.0, 4.0, 5.0], 5.0), 0.0);
        assert_eq!(max_overshoot(&[1.0, 2.0], 0.0), 0.0);
    }

    #[test]
    fn settling_time_follows_last_excursion() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0];
        let output = [0.0, 3.0, 5.5, 4.8, 4.9];
        // 5.5 is outside 4.75 ± 0.25; the response settles at index 3.
        assert_eq!(settling_time(&time, &output, 5.0), 3.0);
    }

    #[test]
    fn settling_time_ignores_excursion_at_final_sample() {
        let time = [0.0, 1.0, 2.0];
        let output = [4.8, 4.8, 9.0];
        assert_eq!(settling_time(&time, &output, 5.0), 2.0);
    }

    #[test]
    fn rise_time_spans_ten_to_ninety_percent() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0];
        let output = [0.0, 1.0, 3.0, 4.6, 5.0];
        assert_eq!(rise_time(&time, &output, 5.0), 2.0);
    }

    #[test]
    fn rise_time_is_zero_when_never_reached() {
        let time = [0.0, 1.0, 2.0];
        let output = [0.0, 1.0, 2.0];
        assert_eq!(rise_time(&time, &output, 5.0), 0.0);
    }

    #[test]
    fn steady_state_error_uses_final_tenth() {
        let mut output = vec![0.0; 90];
        output.extend(vec![4.5; 10]);
        assert!((steady_state_error(&output, 5.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn compute_on_clean_step() {
        let mut output: Vec<f64> = (0..30).map(|i| 5.0 * i as f64 / 30.0).collect();
        output.extend(vec![5.0; 170]);
        let metrics = PerformanceMetrics::compute(&series(output, 0.001), 5.0);

        assert_eq!(metrics.max_overshoot, 0.0);
        assert!(metrics.rise_time > 0.0);
        assert!(metrics.settling_time > 0.0);
        assert_eq!(metrics.steady_state_error, 0.0);
    }

    #[test]
    fn empty_series_yields_zeroes() {
        let metrics = PerformanceMetrics::compute(&OptimizedSeries::default(), 5.0);
        assert_eq!(metrics, PerformanceMetrics::default());
    }
}
