//! Human-readable description and structured summaries of an analysis.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::calibration::ResolvedPoles;
use crate::performance::PerformanceMetrics;
use crate::predictor::{PolePair, SystemType};
use crate::series::{OptimizedSeries, SeriesMeta};

const HIGHLY_OSCILLATORY_ZETA: f64 = 0.3;
const MODERATELY_OSCILLATORY_ZETA: f64 = 0.7;

/// Renders the description paragraph for a result.
///
/// Deterministic for identical inputs and always ends with the input voltage.
pub fn describe(
    system_type: SystemType,
    poles: &PolePair,
    metrics: &PerformanceMetrics,
    input_voltage: f64,
) -> String {
    let mut text = String::new();
    let [s1, s2] = poles.as_array();

    match system_type {
        SystemType::Underdamped => {
            text.push_str("Underdamped system detected. ");
            if s1.imag != 0.0 {
                let natural_frequency = (s1.real * s1.real + s1.imag * s1.imag).sqrt();
                let damping_ratio = -s1.real / natural_frequency;
                let _ = write!(
                    text,
                    "It oscillates with a natural frequency of {natural_frequency:.3} rad/s \
                     and a damping ratio of {damping_ratio:.3}. "
                );
                text.push_str(if damping_ratio < HIGHLY_OSCILLATORY_ZETA {
                    "The response is highly oscillatory with considerable overshoot. "
                } else if damping_ratio < MODERATELY_OSCILLATORY_ZETA {
                    "The response shows moderate oscillation. "
                } else {
                    "The response is lightly oscillatory. "
                });
            }
            if metrics.max_overshoot > 0.0 {
                let _ = write!(text, "Maximum overshoot of {:.1}%. ", metrics.max_overshoot);
            }
            let _ = write!(
                text,
                "Approximate settling time of {:.3} seconds. ",
                metrics.settling_time
            );
            text.push_str(
                "Systems like this suit applications that need a fast response and can \
                 tolerate some initial oscillation.",
            );
        }
        SystemType::Overdamped => {
            text.push_str("Overdamped system detected. ");
            let _ = write!(
                text,
                "Dominant real poles at s1={:.3} and s2={:.3}. ",
                s1.real, s2.real
            );
            let dominant = s1.real.max(s2.real);
            let _ = write!(
                text,
                "The dominant pole (s={dominant:.3}) sets the speed of the response. "
            );
            text.push_str("The response approaches its final value gradually without oscillating. ");
            let _ = write!(text, "Rise time of {:.3} seconds. ", metrics.rise_time);
            let _ = write!(
                text,
                "Settling time of {:.3} seconds. ",
                metrics.settling_time
            );
            text.push_str(
                "This response suits applications that need stability without oscillation, \
                 at the cost of a slower response.",
            );
        }
        SystemType::CriticallyDamped => {
            text.push_str("Critically damped system detected. ");
            text.push_str("It sits on the boundary between underdamped and overdamped behaviour ");
            text.push_str("and gives the fastest response possible without oscillation. ");
            let _ = write!(text, "Repeated pole at s={:.3}. ", s1.real);
            text.push_str("Ideal where a fast response without overshoot is required.");
        }
        SystemType::Unknown => {
            text.push_str("Control system identified with specific characteristics. ");
            let _ = write!(text, "{} poles were identified. ", poles.as_array().len());
            text.push_str("See the technical data for details of the system behaviour.");
        }
    }

    let _ = write!(text, " Analysis performed with an input voltage of {input_voltage:.1} V.");
    text
}

/// Structured digest stored alongside the description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub pole_count: usize,
    pub complex_poles: bool,
    pub real_poles: bool,
    pub overshoot_pct: f64,
    pub settling_time: f64,
    pub rise_time: f64,
    pub original_points: usize,
    pub processed_points: usize,
}

impl TechnicalSummary {
    pub fn new(
        poles: &PolePair,
        metrics: &PerformanceMetrics,
        original_points: usize,
        processed_points: usize,
    ) -> Self {
        let pole_array = poles.as_array();
        let complex_poles = pole_array.iter().any(|pole| pole.is_complex());
        Self {
            pole_count: pole_array.len(),
            complex_poles,
            real_poles: !complex_poles,
            overshoot_pct: metrics.max_overshoot,
            settling_time: metrics.settling_time,
            rise_time: metrics.rise_time,
            original_points,
            processed_points,
        }
    }
}

/// Predictor-derived fields, present only when the corresponding call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Calibrated poles from the predictor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poles: Option<PolePair>,
}

/// Numeric digest of the run, stored as the result's `raw_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub input_voltage: f64,
    pub original_points: usize,
    pub optimized_points: usize,
    pub sampling_period: f64,
    pub initial_time: f64,
    pub final_time: f64,
    pub initial_value: f64,
    pub final_value: f64,
    #[serde(flatten)]
    pub performance: PerformanceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_predicted_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_pole1_real: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_pole1_imag: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_pole2_real: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_pole2_imag: Option<f64>,
}

impl RawMetrics {
    pub fn new(
        input_voltage: f64,
        original_points: usize,
        meta: &SeriesMeta,
        optimized: &OptimizedSeries,
        performance: PerformanceMetrics,
        prediction: &PredictionRecord,
    ) -> Self {
        let (initial_time, initial_value) = optimized.first().unwrap_or_default();
        let (final_time, final_value) = optimized.last().unwrap_or_default();
        let poles = prediction.poles.map(|pair| pair.as_array());

        Self {
            input_voltage,
            original_points,
            optimized_points: optimized.len(),
            sampling_period: meta.sampling_period,
            initial_time,
            final_time,
            initial_value,
            final_value,
            performance,
            ml_predicted_type: prediction.predicted_type,
            ml_pole1_real: poles.map(|[s1, _]| s1.real),
            ml_pole1_imag: poles.map(|[s1, _]| s1.imag),
            ml_pole2_real: poles.map(|[_, s2]| s2.real),
            ml_pole2_imag: poles.map(|[_, s2]| s2.imag),
        }
    }
}

/// Serializes poles as `[{"real", "imag"}, {"real", "imag"}]`.
pub fn poles_json(poles: &ResolvedPoles) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(poles.pair().as_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::Pole;

    fn metrics() -> PerformanceMetrics {
        PerformanceMetrics {
            max_overshoot: 12.5,
            settling_time: 0.042,
            rise_time: 0.01,
            steady_state_error: 0.3,
        }
    }

    #[test]
    fn underdamped_description_reports_frequency_and_damping() {
        let poles = PolePair::new(Pole::new(-3.0, 4.0), Pole::new(-3.0, -4.0));
        let text = describe(SystemType::Underdamped, &poles, &metrics(), 5.0);

        assert!(text.starts_with("Underdamped system detected."));
        assert!(text.contains("natural frequency of 5.000 rad/s"));
        assert!(text.contains("damping ratio of 0.600"));
        assert!(text.contains("moderate oscillation"));
        assert!(text.contains("Maximum overshoot of 12.5%"));
        assert!(text.ends_with("input voltage of 5.0 V."));
    }

    #[test]
    fn underdamped_with_real_poles_skips_oscillation_sentence() {
        let poles = PolePair::new(Pole::new(-3.0, 0.0), Pole::new(-4.0, 0.0));
        let mut flat = metrics();
        flat.max_overshoot = 0.0;
        let text = describe(SystemType::Underdamped, &poles, &flat, 5.0);

        assert!(!text.contains("natural frequency"));
        assert!(!text.contains("overshoot of"));
        assert!(text.contains("settling time of 0.042"));
    }

    #[test]
    fn damping_tone_buckets() {
        let tone = |real: f64, imag: f64| {
            describe(
                SystemType::Underdamped,
                &PolePair::new(Pole::new(real, imag), Pole::new(real, -imag)),
                &metrics(),
                1.0,
            )
        };
        assert!(tone(-1.0, 10.0).contains("highly oscillatory"));
        assert!(tone(-8.0, 1.0).contains("lightly oscillatory"));
    }

    #[test]
    fn overdamped_description_names_dominant_pole() {
        let poles = PolePair::new(Pole::new(-435.8, 0.0), Pole::new(-45.0, 0.0));
        let text = describe(SystemType::Overdamped, &poles, &metrics(), 12.0);

        assert!(text.contains("s1=-435.800 and s2=-45.000"));
        assert!(text.contains("dominant pole (s=-45.000)"));
        assert!(text.contains("Rise time of 0.010"));
        assert!(text.ends_with("input voltage of 12.0 V."));
    }

    #[test]
    fn every_variant_reports_input_voltage() {
        for system_type in [
            SystemType::Underdamped,
            SystemType::Overdamped,
            SystemType::CriticallyDamped,
            SystemType::Unknown,
        ] {
            let text = describe(system_type, &PolePair::FALLBACK, &metrics(), 3.3);
            assert!(text.ends_with("input voltage of 3.3 V."), "{text}");
        }
    }

    #[test]
    fn summary_flags_complex_poles() {
        let summary = TechnicalSummary::new(&PolePair::FALLBACK, &metrics(), 1000, 300);
        assert_eq!(summary.pole_count, 2);
        assert!(summary.complex_poles);
        assert!(!summary.real_poles);
        assert_eq!(summary.processed_points, 300);
    }

    #[test]
    fn raw_metrics_omit_missing_prediction_fields() {
        let optimized = OptimizedSeries {
            time: vec![0.0, 0.001],
            output: vec![0.0, 5.0],
        };
        let raw = RawMetrics::new(
            5.0,
            10,
            &SeriesMeta::default(),
            &optimized,
            metrics(),
            &PredictionRecord::default(),
        );
        let json = serde_json::to_value(&raw).unwrap();

        assert_eq!(json["final_value"], 5.0);
        assert_eq!(json["max_overshoot"], 12.5);
        assert!(json.get("ml_predicted_type").is_none());
        assert!(json.get("ml_pole1_real").is_none());
    }
}
