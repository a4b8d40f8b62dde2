//! Transient window detection.
//!
//! Finds where the response departs from its pre-step baseline and where it
//! has settled onto the input voltage, so that quiet lead-in and long flat
//! tails do not dominate the downsampled series.

use serde::{Deserialize, Serialize};

const BASELINE_SAMPLES: usize = 10;
const MOVING_AVERAGE_SAMPLES: usize = 5;
const CHANGE_FRACTION: f64 = 0.05;
const MIN_CHANGE_THRESHOLD: f64 = 0.1;
const LEAD_IN_SAMPLES: usize = 10;

const STABLE_FRACTION: f64 = 0.02;
const REQUIRED_STABLE_SAMPLES: usize = 20;
const MIN_WINDOW_SAMPLES: usize = 50;
const TAIL_SAMPLES: usize = 30;
const FALLBACK_WINDOW_FRACTION: f64 = 0.8;

/// Inclusive index range `[start, end]` into the raw series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Number of samples covered; at least one.
    pub fn sample_count(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// Detects the transient window of `values`. `values` must be non-empty.
pub fn detect_window(values: &[f64], input_voltage: f64) -> Window {
    let last = values.len().saturating_sub(1);
    let start = find_significant_change_start(values, input_voltage).min(last);
    let end = find_stabilization_point(values, input_voltage, start).clamp(start, last);
    Window { start, end }
}

/// Index a little before the first departure from the baseline.
///
/// The baseline is the mean of the first ten samples; a five-sample moving
/// average that moves more than `max(5% of |V|, 0.1)` away from it marks the
/// change. Ten samples of lead-in are kept before that point.
pub fn find_significant_change_start(values: &[f64], input_voltage: f64) -> usize {
    if values.len() < BASELINE_SAMPLES {
        return 0;
    }

    let baseline = values[..BASELINE_SAMPLES].iter().sum::<f64>() / BASELINE_SAMPLES as f64;
    let threshold = (input_voltage.abs() * CHANGE_FRACTION).max(MIN_CHANGE_THRESHOLD);

    let scan_end = values.len().saturating_sub(MOVING_AVERAGE_SAMPLES);
    for i in BASELINE_SAMPLES..scan_end {
        let average = values[i..i + MOVING_AVERAGE_SAMPLES].iter().sum::<f64>()
            / MOVING_AVERAGE_SAMPLES as f64;
        if (average - baseline).abs() > threshold {
            return i.saturating_sub(LEAD_IN_SAMPLES);
        }
    }

    0
}

/// Index shortly after the response has settled within 2% of `V`.
///
/// Scans backwards from the end for twenty consecutive in-band samples and
/// keeps thirty samples of tail past that run. Without such a run, 80% of the
/// remaining samples after `start` are kept.
pub fn find_stabilization_point(values: &[f64], input_voltage: f64, start: usize) -> usize {
    let len = values.len();
    let last = len.saturating_sub(1);
    if len <= start + MIN_WINDOW_SAMPLES {
        return last;
    }

    let tolerance = input_voltage.abs() * STABLE_FRACTION;
    let mut stable = 0;
    for i in ((start + MIN_WINDOW_SAMPLES + 1)..len).rev() {
        if (values[i] - input_voltage).abs() <= tolerance {
            stable += 1;
            if stable >= REQUIRED_STABLE_SAMPLES {
                return (i + TAIL_SAMPLES).min(last);
            }
        } else {
            stable = 0;
        }
    }

    let fallback = start + ((len - start) as f64 * FALLBACK_WINDOW_FRACTION) as usize;
    fallback.min(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_response(len: usize, ramp_start: usize, ramp_end: usize, target: f64) -> Vec<f64> {
        (0..len)
            .map(|i| {
                if i < ramp_start {
                    0.0
                } else if i >= ramp_end {
                    target
                } else {
                    target * (i - ramp_start) as f64 / (ramp_end - ramp_start) as f64
                }
            })
            .collect()
    }

    #[test]
    fn short_series_starts_at_zero() {
        assert_eq!(find_significant_change_start(&[1.0; 9], 5.0), 0);
    }

    #[test]
    fn change_start_keeps_lead_in() {
        let values = step_response(200, 20, 50, 5.0);
        let start = find_significant_change_start(&values, 5.0);
        assert!((10..=15).contains(&start), "start = {start}");
    }

    #[test]
    fn flat_series_has_no_change() {
        assert_eq!(find_significant_change_start(&[2.0; 100], 5.0), 0);
    }

    #[test]
    fn stabilization_found_near_end_of_settled_tail() {
        let values = step_response(200, 20, 50, 5.0);
        let start = find_significant_change_start(&values, 5.0);
        assert_eq!(find_stabilization_point(&values, 5.0, start), 199);
    }

    #[test]
    fn stabilization_run_adds_tail() {
        let mut values = step_response(300, 20, 50, 5.0);
        // Disturb the last 100 samples so the settled run ends at index 199.
        for value in values.iter_mut().skip(200) {
            *value = 7.0;
        }
        // Backward scan sees 20 stable samples at 199..=180 and adds 30.
        assert_eq!(find_stabilization_point(&values, 5.0, 10), 210);
    }

    #[test]
    fn unsettled_series_uses_fallback_fraction() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(find_stabilization_point(&values, 5.0, 0), 80);
    }

    #[test]
    fn short_tail_returns_last_index() {
        let values = vec![0.0; 40];
        assert_eq!(find_stabilization_point(&values, 5.0, 0), 39);
    }

    #[test]
    fn window_bounds_are_ordered_and_in_range() {
        for len in [1usize, 5, 10, 11, 60, 500] {
            let values = step_response(len.max(1), len / 3, len / 2, 3.3);
            let window = detect_window(&values, 3.3);
            assert!(window.start <= window.end);
            assert!(window.end < values.len());
        }
    }
}
